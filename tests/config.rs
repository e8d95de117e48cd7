use assert_matches::assert_matches;
use camino::Utf8Path;

use gcmt3d::config::ConfigLoader;
use gcmt3d::error::Gcmt3dError;

const INPUT: &str = "
database: /data/database
duration: 10800.0
start_label: gcmt
eventdir: /data/events
parameters:
  m_rr:
    scale: 1.0e+25
  m_tt:
    scale: 1.0e+25
  depth_in_m:
    scale: 1000.0
    pert: 500.0
solver: specfem
";

fn origin() -> &'static Utf8Path {
    Utf8Path::new("input.yml")
}

#[test]
fn parameters_keep_file_order() {
    let params = ConfigLoader::resolve_str(INPUT, origin()).unwrap();
    assert_eq!(params.parameter_names(), vec!["m_rr", "m_tt", "depth_in_m"]);
    assert_eq!(params.scaling_vector(), vec![1.0e25, 1.0e25, 1000.0]);
    assert_eq!(params.label_suffix(), "_gcmt");
    assert_eq!(params.max_downloads, 0);
    assert!(params.processparams.is_none());
    assert!(params.extra.contains_key("solver"));
    assert!(params.parameters["depth_in_m"].extra.contains_key("pert"));
}

#[test]
fn missing_duration_is_reported_by_key() {
    let input = INPUT.replace("duration: 10800.0\n", "");
    let err = ConfigLoader::resolve_str(&input, origin()).unwrap_err();
    assert_matches!(err, Gcmt3dError::MissingConfigKey { key, .. } if key == "duration");
}

#[test]
fn null_database_counts_as_missing() {
    let input = INPUT.replace("database: /data/database", "database: null");
    let err = ConfigLoader::resolve_str(&input, origin()).unwrap_err();
    assert_matches!(err, Gcmt3dError::MissingConfigKey { key, .. } if key == "database");
}

#[test]
fn parameter_without_scale_is_reported() {
    let input = INPUT.replace("  m_tt:\n    scale: 1.0e+25\n", "  m_tt: {}\n");
    let err = ConfigLoader::resolve_str(&input, origin()).unwrap_err();
    assert_matches!(err, Gcmt3dError::MissingConfigKey { key, .. } if key == "parameters.m_tt.scale");
}

#[test]
fn non_positive_duration_is_rejected() {
    let input = INPUT.replace("duration: 10800.0", "duration: 0");
    let err = ConfigLoader::resolve_str(&input, origin()).unwrap_err();
    assert_matches!(err, Gcmt3dError::ConfigParse { .. });
}

#[test]
fn written_copy_reads_back_equal() {
    let temp = tempfile::tempdir().unwrap();
    let path = camino::Utf8PathBuf::from_path_buf(temp.path().join("input.yml")).unwrap();
    let params = ConfigLoader::resolve_str(INPUT, origin()).unwrap();
    ConfigLoader::write(&params, &path).unwrap();
    assert_eq!(ConfigLoader::resolve(&path).unwrap(), params);
}
