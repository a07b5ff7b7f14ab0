//! Rankings query construction and result parsing.

use serde_json::Value;

use crate::catalog::SpecDef;
use crate::errors::{LorrgsError, LorrgsResult};
use crate::models::{CharacterRanking, CharacterRankings, RankingRequest};

/// Regional partition requested by the second branch.
pub const REGION_PARTITION: i64 = 3;
pub const REGION_SERVER: &str = "CN";

/// Class name the regional branch asks for; the spec name scopes it.
pub const GLOBAL_CLASS_NAME: &str = "Global";

/// Difficulty code used when a name is not recognised.
pub const DEFAULT_DIFFICULTY_ID: i64 = 101;

/// Map a difficulty name to the integer code the analytics API expects.
pub fn difficulty_id(name: &str) -> i64 {
    match name.trim().to_lowercase().as_str() {
        "normal" => 100,
        "heroic" | "mythic" | "savage" => 101,
        "extreme" => 102,
        "ultimate" => 103,
        _ => DEFAULT_DIFFICULTY_ID,
    }
}

/// Inputs for the two-branch rankings query.
#[derive(Clone, Debug, PartialEq)]
pub struct RankingsQuery {
    pub encounter_id: i64,
    pub metric: String,
    pub difficulty_id: i64,
    /// Class requested by the global branch.
    pub class_name: String,
    pub spec_name: String,
}

impl RankingsQuery {
    fn branch(&self, alias: &str, class_name: &str, extra_args: &str) -> String {
        let mut args = vec![
            format!("className: \"{class_name}\""),
            format!("specName: \"{}\"", self.spec_name),
            format!("metric: {}", self.metric),
            format!("difficulty: {}", self.difficulty_id),
            "includeCombatantInfo: true".to_string(),
        ];
        if !extra_args.is_empty() {
            args.push(extra_args.to_string());
        }
        let mut text = format!("        {alias}: characterRankings(\n");
        for arg in args {
            text.push_str("            ");
            text.push_str(&arg);
            text.push('\n');
        }
        text.push_str("        )\n");
        text
    }

    /// Render the query body: the named class globally, and the "Global"
    /// class within the regional partition.
    pub fn render(&self) -> String {
        let region_args =
            format!("partition: {REGION_PARTITION}, serverRegion: \"{REGION_SERVER}\"");
        format!(
            "worldData\n{{\n    encounter(id: {id})\n    {{\n{global}{cn}    }}\n}}\n",
            id = self.encounter_id,
            global = self.branch("global", &self.class_name, ""),
            cn = self.branch("cn", GLOBAL_CLASS_NAME, &region_args),
        )
    }
}

/// Two-branch leaderboard query for `request` against one encounter.
pub fn build_rankings_query(request: &RankingRequest, encounter_id: i64, spec: &SpecDef) -> RankingsQuery {
    RankingsQuery {
        encounter_id,
        metric: request.metric.clone(),
        difficulty_id: difficulty_id(&request.difficulty),
        class_name: spec.class_name_slug_cap(),
        spec_name: spec.name_slug_cap(),
    }
}

fn parse_branch(encounter: &Value, alias: &str) -> LorrgsResult<Vec<CharacterRanking>> {
    match encounter.get(alias) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(branch) => {
            let page: CharacterRankings = serde_json::from_value(branch.clone())
                .map_err(|e| LorrgsError::Payload(format!("{alias} rankings: {e}")))?;
            Ok(page.rankings)
        }
    }
}

/// Extract the global branch followed by the regional branch.
pub fn parse_rankings_result(result: &Value) -> LorrgsResult<Vec<CharacterRanking>> {
    let encounter = result
        .get("worldData")
        .and_then(|w| w.get("encounter"))
        .cloned()
        .unwrap_or(Value::Null);
    let mut rankings = parse_branch(&encounter, "global")?;
    rankings.extend(parse_branch(&encounter, "cn")?);
    Ok(rankings)
}
