use gcmt3d::processing::{ProcessingConfig, adapt};
use gcmt3d::rules::{GcmtRules, WaveRule, WaveRules};

const TEMPLATE: &str = "
body:
  weight: 0.5
  process:
    relative_starttime: -50
    relative_endtime: 1000
    pre_filt: [150.0, 100.0, 50.0, 40.0]
  window:
    - config:
        min_period: 40
        max_period: 150
        stalta_waterlevel: 0.1
      components: Z
    - config:
        min_period: 40
        max_period: 150
      components: RT
surface:
  weight: 1.0
  process:
    relative_endtime: 1000
  window:
    - config: {}
";

fn fixed_rules() -> WaveRules {
    let mut rules = WaveRules::new();
    rules.insert(
        "body".to_string(),
        WaveRule {
            weight: Some(1.0),
            filter: [1.0, 2.0, 3.0, 4.0],
            relative_endtime: 200.0,
        },
    );
    rules.insert(
        "surface".to_string(),
        WaveRule {
            weight: Some(0.0),
            filter: [1.0, 2.0, 3.0, 4.0],
            relative_endtime: 100.0,
        },
    );
    rules
}

fn template() -> ProcessingConfig {
    serde_yaml::from_str(TEMPLATE).unwrap()
}

#[test]
fn zero_weight_wave_is_dropped_and_endtime_capped() {
    let adapted = adapt(6.5, 15_000.0, template(), 150.0, &fixed_rules());

    assert_eq!(adapted.waves.keys().collect::<Vec<_>>(), vec!["body"]);
    let body = adapted.get("body").unwrap();
    assert_eq!(body.weight, 1.0);
    assert_eq!(body.process.relative_endtime, Some(150.0));
    assert_eq!(body.process.pre_filt, Some([1.0, 0.5, 1.0 / 3.0, 0.25]));
    for window in &body.window {
        assert_eq!(window.config.min_period, Some(4.0));
        assert_eq!(window.config.max_period, Some(1.0));
    }
}

#[test]
fn rule_endtime_kept_when_shorter_than_duration() {
    let adapted = adapt(6.5, 15_000.0, template(), 3600.0, &fixed_rules());
    let body = adapted.get("body").unwrap();
    assert_eq!(body.process.relative_endtime, Some(200.0));
}

#[test]
fn unrelated_settings_survive_adaptation() {
    let adapted = adapt(6.5, 15_000.0, template(), 150.0, &fixed_rules());
    let body = adapted.get("body").unwrap();
    assert!(body.process.extra.contains_key("relative_starttime"));
    assert_eq!(body.window.len(), 2);
    assert!(body.window[0].config.extra.contains_key("stalta_waterlevel"));
    assert!(body.window[1].extra.contains_key("components"));
}

#[test]
fn wave_without_rule_is_dropped() {
    let mut rules = fixed_rules();
    rules.shift_remove("body");
    let adapted = adapt(6.5, 15_000.0, template(), 150.0, &rules);
    assert!(adapted.is_empty());
}

#[test]
fn empty_template_stays_empty() {
    let adapted = adapt(7.0, 20_000.0, ProcessingConfig::default(), 3600.0, &GcmtRules);
    assert!(adapted.is_empty());
}

#[test]
fn adapted_config_round_trips_through_yaml() {
    let adapted = adapt(6.5, 15_000.0, template(), 150.0, &fixed_rules());
    let yaml = serde_yaml::to_string(&adapted).unwrap();
    let again: ProcessingConfig = serde_yaml::from_str(&yaml).unwrap();
    assert_eq!(again, adapted);
}
