use camino::Utf8Path;
use indexmap::IndexMap;
use proptest::prelude::*;

use gcmt3d::npy::Array;
use gcmt3d::processing::{
    ProcessSettings, ProcessingConfig, WaveProcessing, WindowConfig, WindowSettings, adapt,
};
use gcmt3d::rules::{GcmtRules, RuleTable, WaveRule, WaveRules};

const WAVES: [&str; 4] = ["body", "surface", "mantle", "love"];

fn template(waves: &[&str]) -> ProcessingConfig {
    let waves = waves
        .iter()
        .map(|wave| {
            let settings = WaveProcessing {
                weight: 0.5,
                process: ProcessSettings {
                    pre_filt: Some([100.0, 50.0, 25.0, 10.0]),
                    relative_endtime: Some(1.0e6),
                    ..ProcessSettings::default()
                },
                window: vec![WindowSettings {
                    config: WindowConfig::default(),
                    ..WindowSettings::default()
                }],
                ..WaveProcessing::default()
            };
            (wave.to_string(), settings)
        })
        .collect();
    ProcessingConfig { waves }
}

fn periods() -> impl Strategy<Value = [f64; 4]> {
    prop::collection::vec(1.0f64..1000.0, 4).prop_map(|mut values| {
        values.sort_by(|a, b| b.total_cmp(a));
        [values[0], values[1], values[2], values[3]]
    })
}

fn rule() -> impl Strategy<Value = WaveRule> {
    (
        prop::option::of(-1.0f64..2.0),
        periods(),
        1.0f64..20_000.0,
    )
        .prop_map(|(weight, filter, relative_endtime)| WaveRule {
            weight,
            filter,
            relative_endtime,
        })
}

fn rules() -> impl Strategy<Value = WaveRules> {
    prop::collection::vec(prop::option::of(rule()), WAVES.len()).prop_map(|rules| {
        WAVES
            .iter()
            .zip(rules)
            .filter_map(|(wave, rule)| rule.map(|rule| (wave.to_string(), rule)))
            .collect::<IndexMap<_, _>>()
    })
}

proptest! {
    #[test]
    fn adapted_waves_are_exactly_the_positive_weight_rules(
        rules in rules(),
        magnitude in 4.0f64..9.5,
        depth in 0.0f64..700_000.0,
        max_duration in 1.0f64..20_000.0,
    ) {
        let adapted = adapt(magnitude, depth, template(&WAVES), max_duration, &rules);

        let expected: Vec<&str> = WAVES
            .iter()
            .copied()
            .filter(|wave| {
                rules
                    .get(*wave)
                    .and_then(|rule| rule.weight)
                    .is_some_and(|weight| weight > 0.0)
            })
            .collect();
        let kept: Vec<&str> = adapted.waves.keys().map(String::as_str).collect();
        prop_assert_eq!(kept, expected);

        for (wave, settings) in &adapted.waves {
            let rule = &rules[wave];
            let endtime = settings.process.relative_endtime.unwrap();
            prop_assert!(endtime <= max_duration);
            prop_assert!(endtime <= rule.relative_endtime);

            let pre_filt = settings.process.pre_filt.unwrap();
            for (frequency, period) in pre_filt.iter().zip(rule.filter) {
                prop_assert!((frequency * period - 1.0).abs() < 1e-12);
            }
            for window in &settings.window {
                prop_assert_eq!(window.config.min_period, Some(rule.filter[3]));
                prop_assert_eq!(window.config.max_period, Some(rule.filter[0]));
            }
        }
    }

    #[test]
    fn builtin_rules_yield_ascending_frequencies(
        magnitude in 4.0f64..9.5,
        depth in 0.0f64..700_000.0,
    ) {
        let adapted = adapt(
            magnitude,
            depth,
            ProcessingConfig::builtin().unwrap(),
            10_800.0,
            &GcmtRules,
        );
        prop_assert!(!adapted.is_empty());
        for settings in adapted.waves.values() {
            let pre_filt = settings.process.pre_filt.unwrap();
            prop_assert!(pre_filt.windows(2).all(|pair| pair[0] < pair[1]));
        }
        let enabled = GcmtRules.determine(magnitude, depth);
        prop_assert!(adapted.len() <= enabled.len());
    }

    #[test]
    fn npy_vectors_are_bit_identical(values in prop::collection::vec(any::<f64>(), 0..64)) {
        let bytes = Array::vector(values.clone()).encode();
        let decoded = Array::decode(&bytes, Utf8Path::new("m.npy")).unwrap();
        prop_assert_eq!(decoded.shape, vec![values.len()]);
        let bits: Vec<u64> = decoded.data.iter().map(|value| value.to_bits()).collect();
        let expected: Vec<u64> = values.iter().map(|value| value.to_bits()).collect();
        prop_assert_eq!(bits, expected);
    }
}
