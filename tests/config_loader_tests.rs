use obs_bootstrap::config::{ConfigError, ConfigLoader, DashboardSource, TenantDefinition};
use std::{
    env, fs,
    path::PathBuf,
    sync::{Mutex, MutexGuard, OnceLock},
};
use tempfile::TempDir;

fn env_lock() -> &'static Mutex<()> {
    static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    LOCK.get_or_init(|| Mutex::new(()))
}

fn env_guard() -> MutexGuard<'static, ()> {
    env_lock()
        .lock()
        .unwrap_or_else(|poison| poison.into_inner())
}

fn clear_env() {
    let keys: Vec<String> = env::vars()
        .map(|(key, _)| key)
        .filter(|key| key.starts_with("OBS_"))
        .collect();
    unsafe {
        for key in keys {
            env::remove_var(key);
        }
    }
}

fn write_env_file(dir: &TempDir, name: &str, contents: &str) {
    let path = dir.path().join(name);
    fs::write(path, contents).unwrap();
}

#[test]
fn loads_defaults_when_no_env_present() {
    let _guard = env_guard();
    clear_env();

    let temp_dir = TempDir::new().unwrap();
    let cfg = ConfigLoader::with_base_dir(temp_dir.path().to_path_buf())
        .load()
        .expect("config loads with defaults");

    assert_eq!(cfg.profile, "local");
    assert_eq!(cfg.grafana_url, "http://localhost:3000");
    assert_eq!(cfg.admin_user, "admin");
    assert!(cfg.admin_password.is_none());
    assert_eq!(cfg.secret.namespace, "observability-prd");
    assert_eq!(cfg.secret.name, "grafana-admin-creds");
    assert_eq!(cfg.secret.key, "admin-password");
    assert!(!cfg.port_forward.enabled);
    assert_eq!(cfg.output_file, PathBuf::from("bootstrap-results.json"));

    let names: Vec<_> = cfg.tenants.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["platform-k8s", "platform-obs", "devteam-1"]);
    assert_eq!(cfg.dashboards.len(), 3);
    assert!(cfg.dashboard_org_id.is_none());
    clear_env();
}

#[test]
fn layered_env_files_apply_in_order() {
    let _guard = env_guard();
    clear_env();

    let temp_dir = TempDir::new().unwrap();
    write_env_file(&temp_dir, ".env", "OBS_GRAFANA_URL=http://grafana-a:3000\n");
    write_env_file(&temp_dir, ".env.test", "OBS_GRAFANA_URL=http://grafana-b:3000\n");
    write_env_file(
        &temp_dir,
        ".env.test.local",
        "OBS_GRAFANA_URL=http://grafana-c:3000/\n",
    );

    // Select profile via .env.local before profile-specific files load.
    write_env_file(
        &temp_dir,
        ".env.local",
        "OBS_PROFILE=test\nOBS_GRAFANA_URL=http://grafana-local:3000\nOBS_LOG_LEVEL=debug\n",
    );

    let cfg = ConfigLoader::with_base_dir(temp_dir.path().to_path_buf())
        .load()
        .expect("layered config loads");

    assert_eq!(cfg.profile, "test");
    // Trailing slash is trimmed.
    assert_eq!(cfg.grafana_url, "http://grafana-c:3000");
    assert_eq!(cfg.log_level, "debug");
    clear_env();
}

#[test]
fn process_env_overrides_files() {
    let _guard = env_guard();
    clear_env();

    let temp_dir = TempDir::new().unwrap();
    write_env_file(
        &temp_dir,
        ".env",
        "OBS_ADMIN_PASSWORD=from-file\nOBS_OUTPUT_FILE=file.json\n",
    );

    unsafe {
        env::set_var("OBS_ADMIN_PASSWORD", "from-env");
        env::set_var("OBS_PORT_FORWARD", "true");
        env::set_var("OBS_PORT_FORWARD_LOCAL_PORT", "13000");
    }

    let cfg = ConfigLoader::with_base_dir(temp_dir.path().to_path_buf())
        .load()
        .expect("config loads");

    assert_eq!(cfg.admin_password.as_deref(), Some("from-env"));
    assert_eq!(cfg.output_file, PathBuf::from("file.json"));
    assert!(cfg.port_forward.enabled);
    assert_eq!(cfg.port_forward.local_port, 13000);
    clear_env();
}

#[test]
fn tenants_and_dashboards_parse_from_lists() {
    let _guard = env_guard();
    clear_env();

    let temp_dir = TempDir::new().unwrap();
    unsafe {
        env::set_var("OBS_TENANTS", "devteam-2, billing:tenant-billing:sa-billing");
        env::set_var(
            "OBS_DASHBOARDS",
            "Node=https://example.com/a?rev=1; Logs=https://example.com/b",
        );
        env::set_var("OBS_DASHBOARD_ORG_ID", "4");
    }

    let cfg = ConfigLoader::with_base_dir(temp_dir.path().to_path_buf())
        .load()
        .expect("config loads");

    assert_eq!(
        cfg.tenants,
        vec![
            TenantDefinition::named("devteam-2"),
            TenantDefinition {
                name: "billing".to_string(),
                tenant_id: "tenant-billing".to_string(),
                service_account: "sa-billing".to_string(),
            },
        ]
    );
    assert_eq!(
        cfg.dashboards,
        vec![
            DashboardSource::new("Node", "https://example.com/a?rev=1"),
            DashboardSource::new("Logs", "https://example.com/b"),
        ]
    );
    assert_eq!(cfg.dashboard_org_id, Some(4));
    clear_env();
}

#[test]
fn invalid_values_are_rejected() {
    let _guard = env_guard();
    clear_env();

    let temp_dir = TempDir::new().unwrap();

    unsafe {
        env::set_var("OBS_TENANTS", "a:b:c:d");
    }
    let err = ConfigLoader::with_base_dir(temp_dir.path().to_path_buf())
        .load()
        .unwrap_err();
    assert!(matches!(err, ConfigError::InvalidTenantEntry { .. }));
    clear_env();

    unsafe {
        env::set_var("OBS_TENANTS", "dup,dup");
    }
    let err = ConfigLoader::with_base_dir(temp_dir.path().to_path_buf())
        .load()
        .unwrap_err();
    assert!(matches!(err, ConfigError::DuplicateTenant { .. }));
    clear_env();

    unsafe {
        env::set_var("OBS_DASHBOARDS", "missing separator");
    }
    let err = ConfigLoader::with_base_dir(temp_dir.path().to_path_buf())
        .load()
        .unwrap_err();
    assert!(matches!(err, ConfigError::InvalidDashboardEntry { .. }));
    clear_env();

    unsafe {
        env::set_var("OBS_DASHBOARD_ORG_ID", "main");
    }
    let err = ConfigLoader::with_base_dir(temp_dir.path().to_path_buf())
        .load()
        .unwrap_err();
    assert!(matches!(err, ConfigError::InvalidDashboardOrgId { .. }));
    clear_env();

    unsafe {
        env::set_var("OBS_GRAFANA_URL", "localhost without scheme");
    }
    let err = ConfigLoader::with_base_dir(temp_dir.path().to_path_buf())
        .load()
        .unwrap_err();
    assert!(matches!(err, ConfigError::InvalidGrafanaUrl { .. }));
    clear_env();
}
