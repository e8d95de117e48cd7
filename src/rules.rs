use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaveRule {
    pub weight: Option<f64>,
    /// Filter corner periods in seconds, longest first.
    pub filter: [f64; 4],
    pub relative_endtime: f64,
}

pub type WaveRules = IndexMap<String, WaveRule>;

pub trait RuleTable {
    fn determine(&self, magnitude: f64, depth_in_m: f64) -> WaveRules;
}

impl RuleTable for WaveRules {
    fn determine(&self, _magnitude: f64, _depth_in_m: f64) -> WaveRules {
        self.clone()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum MagnitudeClass {
    Small,
    Moderate,
    Large,
    Major,
    Great,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DepthClass {
    Shallow,
    Deep,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Bucket {
    pub magnitude: MagnitudeClass,
    pub depth: DepthClass,
}

impl Bucket {
    pub const DEEP_THRESHOLD_M: f64 = 300_000.0;

    pub fn classify(magnitude: f64, depth_in_m: f64) -> Self {
        let magnitude = if magnitude < 5.5 {
            MagnitudeClass::Small
        } else if magnitude < 6.5 {
            MagnitudeClass::Moderate
        } else if magnitude < 7.5 {
            MagnitudeClass::Large
        } else if magnitude < 8.0 {
            MagnitudeClass::Major
        } else {
            MagnitudeClass::Great
        };
        let depth = if depth_in_m < Self::DEEP_THRESHOLD_M {
            DepthClass::Shallow
        } else {
            DepthClass::Deep
        };
        Self { magnitude, depth }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct GcmtRules;

impl GcmtRules {
    pub fn rules_for(&self, bucket: Bucket) -> WaveRules {
        use MagnitudeClass::*;

        let mut rules = WaveRules::new();

        let body = match bucket.magnitude {
            Small | Moderate => Some([150.0, 100.0, 50.0, 40.0]),
            Large => Some([150.0, 100.0, 60.0, 50.0]),
            Major => Some([200.0, 150.0, 60.0, 50.0]),
            Great => None,
        };
        rules.insert(
            "body".to_string(),
            WaveRule {
                weight: body.map(|_| 1.0),
                filter: body.unwrap_or([150.0, 100.0, 50.0, 40.0]),
                relative_endtime: 3600.0,
            },
        );

        let surface = match (bucket.magnitude, bucket.depth) {
            (_, DepthClass::Deep) | (Small, _) | (Great, _) => None,
            (Moderate, _) => Some([150.0, 100.0, 60.0, 50.0]),
            (Large | Major, _) => Some([150.0, 125.0, 75.0, 60.0]),
        };
        rules.insert(
            "surface".to_string(),
            WaveRule {
                weight: surface.map(|_| 1.0),
                filter: surface.unwrap_or([150.0, 100.0, 60.0, 50.0]),
                relative_endtime: 7200.0,
            },
        );

        let (mantle, mantle_endtime) = match bucket.magnitude {
            Small => (None, 10800.0),
            Moderate => (Some([350.0, 300.0, 150.0, 125.0]), 10800.0),
            Large => (Some([400.0, 350.0, 175.0, 150.0]), 10800.0),
            Major | Great => (Some([450.0, 400.0, 250.0, 200.0]), 16200.0),
        };
        rules.insert(
            "mantle".to_string(),
            WaveRule {
                weight: mantle.map(|_| 1.0),
                filter: mantle.unwrap_or([350.0, 300.0, 150.0, 125.0]),
                relative_endtime: mantle_endtime,
            },
        );

        rules
    }
}

impl RuleTable for GcmtRules {
    fn determine(&self, magnitude: f64, depth_in_m: f64) -> WaveRules {
        self.rules_for(Bucket::classify(magnitude, depth_in_m))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enabled(rules: &WaveRules) -> Vec<&str> {
        rules
            .iter()
            .filter(|(_, rule)| rule.weight.is_some_and(|w| w > 0.0))
            .map(|(wave, _)| wave.as_str())
            .collect()
    }

    #[test]
    fn classify_bucket_edges() {
        assert_eq!(Bucket::classify(5.49, 0.0).magnitude, MagnitudeClass::Small);
        assert_eq!(Bucket::classify(5.5, 0.0).magnitude, MagnitudeClass::Moderate);
        assert_eq!(Bucket::classify(7.5, 0.0).magnitude, MagnitudeClass::Major);
        assert_eq!(Bucket::classify(8.3, 0.0).magnitude, MagnitudeClass::Great);
        assert_eq!(Bucket::classify(6.0, 299_999.0).depth, DepthClass::Shallow);
        assert_eq!(Bucket::classify(6.0, 300_000.0).depth, DepthClass::Deep);
    }

    #[test]
    fn small_shallow_event_uses_body_waves_only() {
        let rules = GcmtRules.determine(5.0, 10_000.0);
        assert_eq!(enabled(&rules), vec!["body"]);
    }

    #[test]
    fn deep_event_drops_surface_waves() {
        let rules = GcmtRules.determine(7.0, 550_000.0);
        assert_eq!(enabled(&rules), vec!["body", "mantle"]);
    }

    #[test]
    fn great_event_uses_mantle_waves_only() {
        let rules = GcmtRules.determine(8.6, 20_000.0);
        assert_eq!(enabled(&rules), vec!["mantle"]);
        assert_eq!(rules["mantle"].relative_endtime, 16200.0);
    }

    #[test]
    fn filter_periods_are_longest_first() {
        for magnitude in [5.0, 6.0, 7.0, 7.7, 8.5] {
            for (_, rule) in GcmtRules.determine(magnitude, 10_000.0) {
                assert!(rule.filter.windows(2).all(|pair| pair[0] > pair[1]));
            }
        }
    }
}
