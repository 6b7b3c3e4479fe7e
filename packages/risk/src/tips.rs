//! Fixed safety tip and route recommendation tables.

use crime_risk_risk_models::{CrimeTypeCount, RiskLevel};

use crate::config::RiskConfig;

/// General advice for a perimeter at the given risk level.
#[must_use]
pub const fn level_tip(level: RiskLevel) -> &'static str {
    match level {
        RiskLevel::High => {
            "High crime activity nearby. Avoid walking alone, especially at night, and keep emergency hotlines ready."
        }
        RiskLevel::MediumHigh => {
            "Crime activity here is elevated. Stay on well-lit main roads and travel with companions when possible."
        }
        RiskLevel::Medium => {
            "Moderate crime activity reported. Stay aware of your surroundings and keep valuables out of sight."
        }
        RiskLevel::LowMedium => {
            "A few incidents were reported nearby. Practice normal precautions and secure your belongings."
        }
        RiskLevel::Low => {
            "No recent incidents within the area. Keep following everyday safety habits."
        }
    }
}

/// Advice for a route whose worst segment is at the given level.
#[must_use]
pub const fn route_level_recommendation(level: RiskLevel) -> &'static str {
    match level {
        RiskLevel::High => {
            "This route passes through a high-risk area. Consider an alternative route or travel during daylight."
        }
        RiskLevel::MediumHigh => {
            "Parts of this route have elevated crime activity. Stay on main roads and avoid stopping in isolated spots."
        }
        RiskLevel::Medium => {
            "Some segments have moderate crime activity. Stay alert and keep your phone charged."
        }
        RiskLevel::LowMedium | RiskLevel::Low => {
            "This route has little recorded crime activity. Normal precautions apply."
        }
    }
}

/// Keyword table mapping crime type names to targeted advice.
///
/// Matched case-insensitively against the catalog name; first hit wins,
/// so more specific keywords come first.
const CRIME_TYPE_TIPS: &[(&str, &str)] = &[
    (
        "carnap",
        "Vehicle thefts reported nearby. Park in attended, well-lit areas and use a steering lock.",
    ),
    (
        "motor",
        "Vehicle thefts reported nearby. Park in attended, well-lit areas and use a steering lock.",
    ),
    (
        "robbery",
        "Robberies reported nearby. Avoid displaying phones and jewelry and stay in busy areas.",
    ),
    (
        "snatch",
        "Snatching incidents reported nearby. Carry bags on the side away from the road.",
    ),
    (
        "theft",
        "Thefts reported nearby. Keep bags closed and in front of you and don't leave items unattended.",
    ),
    (
        "burglary",
        "Break-ins reported nearby. Lock doors and windows and ask neighbors to watch your home when away.",
    ),
    (
        "assault",
        "Physical assaults reported nearby. Avoid confrontations and move toward populated areas if threatened.",
    ),
    (
        "physical",
        "Physical assaults reported nearby. Avoid confrontations and move toward populated areas if threatened.",
    ),
    (
        "homicide",
        "Serious violent crimes reported nearby. Avoid the area after dark and report suspicious activity immediately.",
    ),
    (
        "murder",
        "Serious violent crimes reported nearby. Avoid the area after dark and report suspicious activity immediately.",
    ),
    (
        "drug",
        "Drug-related incidents reported nearby. Avoid isolated alleys and report suspicious activity to the barangay.",
    ),
    (
        "vandal",
        "Property damage reported nearby. Secure vehicles and report damage promptly.",
    ),
    (
        "harass",
        "Harassment reported nearby. Travel with companions and report incidents to the barangay desk.",
    ),
    (
        "fraud",
        "Scams reported nearby. Verify identities before handing over money or personal details.",
    ),
    (
        "scam",
        "Scams reported nearby. Verify identities before handing over money or personal details.",
    ),
];

/// Advice for a single crime type name.
#[must_use]
pub fn crime_type_tip(name: &str) -> String {
    let lower = name.to_lowercase();
    CRIME_TYPE_TIPS
        .iter()
        .find(|(keyword, _)| lower.contains(keyword))
        .map_or_else(
            || format!("{name} incidents were reported nearby. Stay alert and report anything suspicious."),
            |(_, tip)| (*tip).to_string(),
        )
}

/// Builds the tip list for a perimeter: the level tip followed by tips
/// for crime types at or above the configured share, capped at
/// `max_tips` in total.
///
/// `breakdown` must already be sorted largest first.
#[must_use]
pub fn safety_tips(
    level: RiskLevel,
    breakdown: &[CrimeTypeCount],
    config: &RiskConfig,
) -> Vec<String> {
    let mut tips = vec![level_tip(level).to_string()];
    extend_with_crime_type_tips(&mut tips, breakdown, config);
    tips
}

/// Builds route recommendations from the worst segment level and the
/// route-wide crime type breakdown.
#[must_use]
pub fn route_recommendations(
    level: RiskLevel,
    breakdown: &[CrimeTypeCount],
    config: &RiskConfig,
) -> Vec<String> {
    let mut recommendations = vec![route_level_recommendation(level).to_string()];
    extend_with_crime_type_tips(&mut recommendations, breakdown, config);
    recommendations
}

fn extend_with_crime_type_tips(
    tips: &mut Vec<String>,
    breakdown: &[CrimeTypeCount],
    config: &RiskConfig,
) {
    for entry in breakdown
        .iter()
        .filter(|entry| entry.percentage >= config.tip_percentage_threshold)
    {
        if tips.len() >= config.max_tips {
            break;
        }
        let tip = crime_type_tip(&entry.crime_type);
        if !tips.contains(&tip) {
            tips.push(tip);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: i32, name: &str, percentage: f64) -> CrimeTypeCount {
        CrimeTypeCount {
            crime_type_id: id,
            crime_type: name.to_string(),
            count: 1,
            percentage,
        }
    }

    #[test]
    fn keyword_lookup_is_case_insensitive() {
        assert!(crime_type_tip("PETTY THEFT").starts_with("Thefts"));
        assert!(crime_type_tip("Carnapping").starts_with("Vehicle"));
    }

    #[test]
    fn unknown_types_get_generic_tip() {
        assert!(crime_type_tip("Illegal Gambling").starts_with("Illegal Gambling incidents"));
    }

    #[test]
    fn tips_capped_at_max() {
        let config = RiskConfig::embedded();
        let breakdown = vec![
            entry(1, "Theft", 30.0),
            entry(2, "Robbery", 25.0),
            entry(3, "Assault", 20.0),
            entry(4, "Drug Possession", 15.0),
            entry(5, "Vandalism", 10.0),
        ];
        let tips = safety_tips(RiskLevel::High, &breakdown, &config);
        assert_eq!(tips.len(), config.max_tips);
        assert_eq!(tips[0], level_tip(RiskLevel::High));
        assert!(tips[1].starts_with("Thefts"));
    }

    #[test]
    fn minor_crime_types_get_no_tip() {
        let config = RiskConfig::embedded();
        let breakdown = vec![entry(1, "Theft", 90.0), entry(2, "Robbery", 10.0)];
        let tips = safety_tips(RiskLevel::Medium, &breakdown, &config);
        assert_eq!(tips.len(), 2);
    }

    #[test]
    fn duplicate_tips_are_collapsed() {
        let config = RiskConfig::embedded();
        let breakdown = vec![entry(1, "Theft", 50.0), entry(2, "Petty Theft", 50.0)];
        let tips = safety_tips(RiskLevel::Medium, &breakdown, &config);
        assert_eq!(tips.len(), 2);
    }

    #[test]
    fn route_recommendations_lead_with_level_advice() {
        let config = RiskConfig::embedded();
        let recs = route_recommendations(RiskLevel::High, &[entry(1, "Robbery", 100.0)], &config);
        assert_eq!(recs[0], route_level_recommendation(RiskLevel::High));
        assert!(recs[1].starts_with("Robberies"));
    }
}
