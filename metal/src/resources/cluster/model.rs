//! Mapping between `metal_cluster` values and cluster API messages

use std::time::Duration;
use tfplug::types::{AttributePath, Diagnostic, Dynamic, DynamicValue};

use crate::api::cluster::{
    Cluster, CreateClusterRequest, KubernetesSpec, Maintenance, MaintenanceTimeWindow, Time,
    UpdateClusterRequest, Worker, WorkerUpdate,
};
use crate::resources::format_timestamp;

pub const DEFAULT_PARTITION: &str = "eqx-mu4";

const SECONDS_PER_HOUR: u64 = 3600;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClusterModel {
    pub id: Option<String>,
    pub name: String,
    pub project: Option<String>,
    pub partition: Option<String>,
    pub tenant: Option<String>,
    pub kubernetes: String,
    pub workers: Vec<WorkerModel>,
    pub maintenance: Option<MaintenanceModel>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkerModel {
    pub name: String,
    pub machine_type: String,
    pub min_size: u32,
    pub max_size: u32,
    pub max_surge: Option<u32>,
    pub max_unavailable: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MaintenanceModel {
    pub kubernetes_autoupdate: Option<bool>,
    pub machineimage_autoupdate: Option<bool>,
    pub time_window: TimeWindowModel,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimeWindowModel {
    pub begin: TimeModel,
    /// Window length in hours
    pub duration: u64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimeModel {
    pub hour: u32,
    pub minute: u32,
    pub time_zone: Option<String>,
}

impl ClusterModel {
    /// Read a plan or state value, unknown values count as unset
    pub fn from_value(value: &DynamicValue) -> Result<Self, Diagnostic> {
        let object = &value.value;

        let workers = match object.get("workers").and_then(Dynamic::as_list) {
            Some(items) => items
                .iter()
                .enumerate()
                .map(|(idx, item)| {
                    WorkerModel::from_dynamic(item, AttributePath::new("workers").index(idx as i64))
                })
                .collect::<Result<Vec<_>, _>>()?,
            None => Vec::new(),
        };

        let maintenance = match object.get("maintenance") {
            Some(m @ Dynamic::Map(_)) => Some(MaintenanceModel::from_dynamic(
                m,
                AttributePath::new("maintenance"),
            )?),
            _ => None,
        };

        Ok(Self {
            id: string_field(object, "id"),
            name: required(string_field(object, "name"), AttributePath::new("name"))?,
            project: string_field(object, "project"),
            partition: string_field(object, "partition"),
            tenant: string_field(object, "tenant"),
            kubernetes: required(
                string_field(object, "kubernetes"),
                AttributePath::new("kubernetes"),
            )?,
            workers,
            maintenance,
        })
    }

    pub fn create_request(&self, default_project: &str) -> CreateClusterRequest {
        CreateClusterRequest {
            name: self.name.clone(),
            project: non_empty(&self.project).unwrap_or(default_project).to_string(),
            partition: non_empty(&self.partition)
                .unwrap_or(DEFAULT_PARTITION)
                .to_string(),
            kubernetes: Some(KubernetesSpec {
                version: self.kubernetes.clone(),
            }),
            workers: self.workers.iter().map(WorkerModel::to_worker).collect(),
            maintenance: Some(
                self.maintenance
                    .as_ref()
                    .map(MaintenanceModel::to_maintenance)
                    .unwrap_or_else(default_maintenance),
            ),
        }
    }

    /// Partial update carrying only what the plan changes relative to `state`
    ///
    /// Identity comes from `state`. Every planned worker group is listed by
    /// name so none is dropped, but only its changed sizes are set.
    pub fn update_request(&self, state: &ClusterModel, default_project: &str) -> UpdateClusterRequest {
        UpdateClusterRequest {
            uuid: state.id.clone().unwrap_or_default(),
            project: non_empty(&state.project)
                .unwrap_or(default_project)
                .to_string(),
            kubernetes: (self.kubernetes != state.kubernetes).then(|| KubernetesSpec {
                version: self.kubernetes.clone(),
            }),
            workers: self
                .workers
                .iter()
                .map(|w| w.changes_since(state.workers.iter().find(|s| s.name == w.name)))
                .collect(),
            maintenance: self
                .maintenance
                .as_ref()
                .and_then(|m| m.changes_since(state.maintenance.as_ref())),
        }
    }
}

impl WorkerModel {
    fn from_dynamic(object: &Dynamic, path: AttributePath) -> Result<Self, Diagnostic> {
        Ok(Self {
            name: required(string_field(object, "name"), path.clone().attribute("name"))?,
            machine_type: required(
                string_field(object, "machine_type"),
                path.clone().attribute("machine_type"),
            )?,
            min_size: required(u32_field(object, "min_size"), path.clone().attribute("min_size"))?,
            max_size: required(u32_field(object, "max_size"), path.attribute("max_size"))?,
            max_surge: u32_field(object, "max_surge"),
            max_unavailable: u32_field(object, "max_unavailable"),
        })
    }

    fn to_worker(&self) -> Worker {
        Worker {
            name: self.name.clone(),
            machine_type: self.machine_type.clone(),
            minsize: self.min_size,
            maxsize: self.max_size,
            maxsurge: self.max_surge.unwrap_or_default(),
            maxunavailable: self.max_unavailable.unwrap_or_default(),
        }
    }

    /// New groups are sent in full
    fn changes_since(&self, stored: Option<&WorkerModel>) -> WorkerUpdate {
        let Some(stored) = stored else {
            return WorkerUpdate {
                name: self.name.clone(),
                machine_type: Some(self.machine_type.clone()),
                minsize: Some(self.min_size),
                maxsize: Some(self.max_size),
                maxsurge: self.max_surge,
                maxunavailable: self.max_unavailable,
            };
        };

        WorkerUpdate {
            name: self.name.clone(),
            machine_type: (self.machine_type != stored.machine_type)
                .then(|| self.machine_type.clone()),
            minsize: (self.min_size != stored.min_size).then_some(self.min_size),
            maxsize: (self.max_size != stored.max_size).then_some(self.max_size),
            maxsurge: changed(self.max_surge, stored.max_surge),
            maxunavailable: changed(self.max_unavailable, stored.max_unavailable),
        }
    }
}

impl MaintenanceModel {
    fn from_dynamic(object: &Dynamic, path: AttributePath) -> Result<Self, Diagnostic> {
        let window_path = path.attribute("time_window");
        let window = object.get("time_window").unwrap_or(&Dynamic::Null);
        let begin_path = window_path.clone().attribute("begin");
        let begin = window.get("begin").unwrap_or(&Dynamic::Null);

        Ok(Self {
            kubernetes_autoupdate: object.get("kubernetes_autoupdate").and_then(Dynamic::as_bool),
            machineimage_autoupdate: object
                .get("machineimage_autoupdate")
                .and_then(Dynamic::as_bool),
            time_window: TimeWindowModel {
                begin: TimeModel {
                    hour: required(u32_field(begin, "hour"), begin_path.clone().attribute("hour"))?,
                    minute: required(
                        u32_field(begin, "minute"),
                        begin_path.attribute("minute"),
                    )?,
                    time_zone: string_field(begin, "time_zone"),
                },
                duration: hours(window, window_path.attribute("duration"))?,
            },
        })
    }

    fn to_maintenance(&self) -> Maintenance {
        Maintenance {
            kubernetes_autoupdate: self.kubernetes_autoupdate,
            machineimage_autoupdate: self.machineimage_autoupdate,
            time_window: Some(self.time_window.to_window()),
        }
    }

    /// None when nothing configurable differs from `stored`
    fn changes_since(&self, stored: Option<&MaintenanceModel>) -> Option<Maintenance> {
        let Some(stored) = stored else {
            return Some(self.to_maintenance());
        };

        let update = Maintenance {
            kubernetes_autoupdate: changed(self.kubernetes_autoupdate, stored.kubernetes_autoupdate),
            machineimage_autoupdate: changed(
                self.machineimage_autoupdate,
                stored.machineimage_autoupdate,
            ),
            time_window: (self.time_window != stored.time_window).then(|| self.time_window.to_window()),
        };
        (update != Maintenance::default()).then_some(update)
    }
}

impl TimeWindowModel {
    fn to_window(&self) -> MaintenanceTimeWindow {
        let begin = &self.begin;
        MaintenanceTimeWindow {
            begin: Some(Time {
                hour: begin.hour,
                minute: begin.minute,
                timezone: begin.time_zone.clone().unwrap_or_else(|| "UTC".to_string()),
            }),
            duration: Some(Duration::from_secs(
                self.duration.saturating_mul(SECONDS_PER_HOUR),
            )),
        }
    }
}

/// Window length in hours, rejecting values that do not fit a duration in seconds
fn hours(window: &Dynamic, path: AttributePath) -> Result<u64, Diagnostic> {
    let value = required(window.get("duration").and_then(Dynamic::as_number), path.clone())?;
    let hours = value as u64;
    if value < 0.0 || value.fract() != 0.0 || hours.checked_mul(SECONDS_PER_HOUR).is_none() {
        return Err(Diagnostic::error(
            "Invalid attribute value",
            format!("Attribute {} must be a whole number of hours, got: {}", path, value),
        )
        .with_attribute(path));
    }
    Ok(hours)
}

/// Window used when the configuration leaves maintenance out
pub fn default_maintenance() -> Maintenance {
    Maintenance {
        kubernetes_autoupdate: None,
        machineimage_autoupdate: None,
        time_window: Some(MaintenanceTimeWindow {
            begin: Some(Time {
                hour: 1,
                minute: 0,
                timezone: "UTC".to_string(),
            }),
            duration: None,
        }),
    }
}

/// State value for a cluster as reported by the API
pub fn cluster_to_state(cluster: &Cluster) -> DynamicValue {
    let workers: Vec<Dynamic> = cluster
        .workers
        .iter()
        .map(|w| {
            Dynamic::object([
                ("name", Dynamic::from(w.name.as_str())),
                ("machine_type", Dynamic::from(w.machine_type.as_str())),
                ("min_size", Dynamic::from(w.minsize)),
                ("max_size", Dynamic::from(w.maxsize)),
                ("max_surge", Dynamic::from(non_zero(w.maxsurge))),
                ("max_unavailable", Dynamic::from(non_zero(w.maxunavailable))),
            ])
        })
        .collect();

    let maintenance = match &cluster.maintenance {
        Some(m) => maintenance_to_dynamic(m),
        None => Dynamic::Null,
    };

    DynamicValue::new(Dynamic::object([
        ("id", Dynamic::from(cluster.uuid.as_str())),
        ("name", Dynamic::from(cluster.name.as_str())),
        ("project", Dynamic::from(cluster.project.as_str())),
        ("partition", Dynamic::from(cluster.partition.as_str())),
        ("tenant", Dynamic::from(cluster.tenant.as_str())),
        ("kubernetes", Dynamic::from(cluster.kubernetes_version())),
        ("workers", Dynamic::List(workers)),
        ("maintenance", maintenance),
        ("created_at", Dynamic::from(format_timestamp(cluster.created_at))),
        ("updated_at", Dynamic::from(format_timestamp(cluster.updated_at))),
    ]))
}

fn maintenance_to_dynamic(maintenance: &Maintenance) -> Dynamic {
    let window = maintenance.time_window.clone().unwrap_or_default();
    let begin = window.begin.unwrap_or_default();
    let hours = window
        .duration
        .map(|d| d.as_secs() / SECONDS_PER_HOUR)
        .unwrap_or_default();

    Dynamic::object([
        (
            "kubernetes_autoupdate",
            Dynamic::from(maintenance.kubernetes_autoupdate.unwrap_or_default()),
        ),
        (
            "machineimage_autoupdate",
            Dynamic::from(maintenance.machineimage_autoupdate.unwrap_or_default()),
        ),
        (
            "time_window",
            Dynamic::object([
                (
                    "begin",
                    Dynamic::object([
                        ("hour", Dynamic::from(begin.hour)),
                        ("minute", Dynamic::from(begin.minute)),
                        ("time_zone", Dynamic::from(begin.timezone)),
                    ]),
                ),
                ("duration", Dynamic::from(hours)),
            ]),
        ),
    ])
}

/// True when `response` only differs from `planned` in the patch component
///
/// The API moves clusters to the latest patch of the requested minor.
pub fn is_patch_upgrade(response: &str, planned: &str) -> bool {
    let response: Vec<&str> = response.split('.').collect();
    let planned: Vec<&str> = planned.split('.').collect();
    if response.len() != 3 || planned.len() != 3 {
        return false;
    }
    response[0] == planned[0] && response[1] == planned[1] && response[2] != planned[2]
}

/// Keep `expected` in `state` when the API reports a patch upgrade of it
pub fn reconcile_version(state: &mut DynamicValue, expected: &str, diagnostics: &mut Vec<Diagnostic>) {
    let path = AttributePath::new("kubernetes");
    let Some(actual) = state.get_optional_string(&path) else {
        return;
    };
    if !is_patch_upgrade(&actual, expected) {
        return;
    }

    tracing::info!(expected, actual = %actual, "kubernetes patch version upgraded by the api");
    diagnostics.push(
        Diagnostic::warning(
            "Upgraded Kubernetes version",
            format!(
                "The cluster runs kubernetes {} instead of the configured {}. Patch upgrades are applied automatically.",
                actual, expected
            ),
        )
        .with_attribute(path.clone()),
    );
    let _ = state.set_string(&path, expected);
}

fn string_field(object: &Dynamic, key: &str) -> Option<String> {
    object.get(key).and_then(Dynamic::as_str).map(str::to_string)
}

fn u32_field(object: &Dynamic, key: &str) -> Option<u32> {
    object
        .get(key)
        .and_then(Dynamic::as_i64)
        .and_then(|n| u32::try_from(n).ok())
}

fn required<T>(value: Option<T>, path: AttributePath) -> Result<T, Diagnostic> {
    value.ok_or_else(|| {
        Diagnostic::error(
            "Missing attribute value",
            format!("Attribute {} must be set to a known value", path),
        )
        .with_attribute(path)
    })
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

/// The planned value when it is set and differs from the stored one
fn changed<T: PartialEq + Copy>(planned: Option<T>, stored: Option<T>) -> Option<T> {
    planned.filter(|p| stored != Some(*p))
}

fn non_zero(value: u32) -> Option<u32> {
    (value != 0).then_some(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;

    fn plan(maintenance: Dynamic) -> DynamicValue {
        DynamicValue::new(Dynamic::object([
            ("id", Dynamic::Unknown),
            ("name", Dynamic::from("cluster")),
            ("project", Dynamic::from("default-project")),
            ("partition", Dynamic::from("eqx-mu4")),
            ("tenant", Dynamic::Unknown),
            ("kubernetes", Dynamic::from("1.28.11")),
            (
                "workers",
                Dynamic::List(vec![Dynamic::object([
                    ("name", Dynamic::from("default")),
                    ("machine_type", Dynamic::from("n1-medium-x86")),
                    ("min_size", Dynamic::from(1u32)),
                    ("max_size", Dynamic::from(3u32)),
                    ("max_surge", Dynamic::from(1u32)),
                    ("max_unavailable", Dynamic::from(0u32)),
                ])]),
            ),
            ("maintenance", maintenance),
            ("created_at", Dynamic::Unknown),
            ("updated_at", Dynamic::Unknown),
        ]))
    }

    fn maintenance() -> Dynamic {
        Dynamic::object([
            ("kubernetes_autoupdate", Dynamic::from(true)),
            ("machineimage_autoupdate", Dynamic::from(false)),
            (
                "time_window",
                Dynamic::object([
                    (
                        "begin",
                        Dynamic::object([
                            ("hour", Dynamic::from(14u32)),
                            ("minute", Dynamic::from(30u32)),
                            ("time_zone", Dynamic::from("UTC")),
                        ]),
                    ),
                    ("duration", Dynamic::from(1u32)),
                ]),
            ),
        ])
    }

    #[test]
    fn patch_upgrade_detection() {
        assert!(is_patch_upgrade("1.28.11", "1.28.10"));
        assert!(!is_patch_upgrade("1.29.1", "1.28.10"));
        assert!(!is_patch_upgrade("2.10.1", "1.28.10"));
        assert!(!is_patch_upgrade("1.28.10", "1.28.10"));
        assert!(!is_patch_upgrade("1.28", "1.28.10"));
    }

    #[test]
    fn create_request_carries_every_field() {
        let model = ClusterModel::from_value(&plan(maintenance())).unwrap();
        let request = model.create_request("session-project");

        assert_eq!(request.name, "cluster");
        assert_eq!(request.project, "default-project");
        assert_eq!(request.partition, "eqx-mu4");
        assert_eq!(request.kubernetes.unwrap().version, "1.28.11");
        assert_eq!(
            request.workers,
            vec![Worker {
                name: "default".to_string(),
                machine_type: "n1-medium-x86".to_string(),
                minsize: 1,
                maxsize: 3,
                maxsurge: 1,
                maxunavailable: 0,
            }]
        );

        let maintenance = request.maintenance.unwrap();
        assert_eq!(maintenance.kubernetes_autoupdate, Some(true));
        assert_eq!(maintenance.machineimage_autoupdate, Some(false));
        let window = maintenance.time_window.unwrap();
        assert_eq!(
            window.begin,
            Some(Time {
                hour: 14,
                minute: 30,
                timezone: "UTC".to_string()
            })
        );
        assert_eq!(window.duration, Some(Duration::from_secs(3600)));
    }

    #[test]
    fn create_request_defaults_maintenance_and_location() {
        let mut value = plan(Dynamic::Unknown);
        let _ = value.set_value(&AttributePath::new("project"), Dynamic::Unknown);
        let _ = value.set_value(&AttributePath::new("partition"), Dynamic::Null);

        let request = ClusterModel::from_value(&value)
            .unwrap()
            .create_request("session-project");

        assert_eq!(request.project, "session-project");
        assert_eq!(request.partition, DEFAULT_PARTITION);
        assert_eq!(request.maintenance, Some(default_maintenance()));
        let window = request.maintenance.unwrap().time_window.unwrap();
        assert_eq!(window.begin.unwrap().hour, 1);
        assert_eq!(window.duration, None);
    }

    fn stored(kubernetes: &str) -> ClusterModel {
        let mut value = plan(maintenance());
        let _ = value.set_string(&AttributePath::new("id"), "8f6c1e2a-3d4b-4c5d-9e6f-7a8b9c0d1e2f");
        let _ = value.set_string(&AttributePath::new("kubernetes"), kubernetes);
        ClusterModel::from_value(&value).unwrap()
    }

    #[test]
    fn update_request_sends_version_change() {
        let state = stored("1.28.11");

        let mut planned = plan(Dynamic::Unknown);
        let _ = planned.set_value(
            &AttributePath::new("workers").index(0).attribute("max_surge"),
            Dynamic::Unknown,
        );
        let _ = planned.set_string(&AttributePath::new("kubernetes"), "1.29.1");
        let planned = ClusterModel::from_value(&planned).unwrap();

        let request = planned.update_request(&state, "session-project");

        assert_eq!(request.uuid, "8f6c1e2a-3d4b-4c5d-9e6f-7a8b9c0d1e2f");
        assert_eq!(request.project, "default-project");
        assert_eq!(request.kubernetes.unwrap().version, "1.29.1");
        assert_eq!(
            request.workers,
            vec![WorkerUpdate {
                name: "default".to_string(),
                ..Default::default()
            }]
        );
        assert_eq!(request.maintenance, None);
    }

    #[test]
    fn update_request_leaves_unchanged_fields_out() {
        // state keeps the configured version even when the api runs a newer patch
        let state = stored("1.28.10");

        let mut planned = plan(maintenance());
        let _ = planned.set_string(&AttributePath::new("kubernetes"), "1.28.10");
        let _ = planned.set_number(
            &AttributePath::new("workers").index(0).attribute("max_size"),
            5.0,
        );
        let planned = ClusterModel::from_value(&planned).unwrap();

        let request = planned.update_request(&state, "session-project");

        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            serde_json::json!({
                "uuid": "8f6c1e2a-3d4b-4c5d-9e6f-7a8b9c0d1e2f",
                "project": "default-project",
                "workers": [{"name": "default", "maxsize": 5}]
            })
        );
    }

    #[test]
    fn update_request_sends_new_groups_and_window_changes() {
        let state = stored("1.28.11");

        let mut planned = plan(maintenance());
        let window = AttributePath::new("maintenance").attribute("time_window");
        let _ = planned.set_number(&window.clone().attribute("duration"), 3.0);
        let _ = planned.set_value(
            &AttributePath::new("maintenance").attribute("kubernetes_autoupdate"),
            Dynamic::Unknown,
        );
        let mut workers = planned
            .get_list(&AttributePath::new("workers"))
            .unwrap();
        workers.push(Dynamic::object([
            ("name", Dynamic::from("gpu")),
            ("machine_type", Dynamic::from("g1-large-x86")),
            ("min_size", Dynamic::from(0u32)),
            ("max_size", Dynamic::from(2u32)),
            ("max_surge", Dynamic::Unknown),
            ("max_unavailable", Dynamic::Null),
        ]));
        let _ = planned.set_list(&AttributePath::new("workers"), workers);
        let planned = ClusterModel::from_value(&planned).unwrap();

        let request = planned.update_request(&state, "session-project");

        assert!(request.kubernetes.is_none());
        assert_eq!(request.workers[0].maxsize, None);
        assert_eq!(
            request.workers[1],
            WorkerUpdate {
                name: "gpu".to_string(),
                machine_type: Some("g1-large-x86".to_string()),
                minsize: Some(0),
                maxsize: Some(2),
                maxsurge: None,
                maxunavailable: None,
            }
        );

        let maintenance = request.maintenance.unwrap();
        assert_eq!(maintenance.kubernetes_autoupdate, None);
        assert_eq!(maintenance.machineimage_autoupdate, None);
        let window = maintenance.time_window.unwrap();
        assert_eq!(window.duration, Some(Duration::from_secs(3 * 3600)));
        assert_eq!(window.begin.unwrap().hour, 14);
    }

    #[test]
    fn oversized_window_is_rejected() {
        let window = AttributePath::new("maintenance")
            .attribute("time_window")
            .attribute("duration");

        for duration in [1e16, -1.0, 1.5] {
            let mut value = plan(maintenance());
            let _ = value.set_number(&window, duration);

            let diag = ClusterModel::from_value(&value).unwrap_err();
            assert_eq!(diag.summary, "Invalid attribute value");
            assert_eq!(diag.attribute, Some(window.clone()));
        }
    }

    #[test]
    fn missing_required_worker_field_is_reported() {
        let mut value = plan(Dynamic::Null);
        let _ = value.set_value(
            &AttributePath::new("workers").index(0).attribute("min_size"),
            Dynamic::Unknown,
        );

        let diag = ClusterModel::from_value(&value).unwrap_err();
        assert_eq!(
            diag.attribute,
            Some(AttributePath::new("workers").index(0).attribute("min_size"))
        );
    }

    #[test]
    fn response_mapping_converts_units_and_timestamps() {
        let cluster = Cluster {
            uuid: "cluster-id".to_string(),
            name: "cluster".to_string(),
            project: "default-project".to_string(),
            partition: "eqx-mu4".to_string(),
            tenant: "tenant".to_string(),
            kubernetes: Some(KubernetesSpec {
                version: "1.28.11".to_string(),
            }),
            workers: vec![Worker {
                name: "default".to_string(),
                machine_type: "n1-medium-x86".to_string(),
                minsize: 1,
                maxsize: 3,
                maxsurge: 1,
                maxunavailable: 0,
            }],
            maintenance: Some(Maintenance {
                kubernetes_autoupdate: Some(true),
                machineimage_autoupdate: Some(false),
                time_window: Some(MaintenanceTimeWindow {
                    begin: Some(Time {
                        hour: 14,
                        minute: 30,
                        timezone: "UTC".to_string(),
                    }),
                    duration: Some(Duration::from_secs(7200)),
                }),
            }),
            created_at: DateTime::from_timestamp(1707382100, 0),
            updated_at: DateTime::from_timestamp(1717932877, 0),
        };

        let state = cluster_to_state(&cluster);
        let path = |name: &str| AttributePath::new(name);

        assert_eq!(state.get_string(&path("id")).unwrap(), "cluster-id");
        assert_eq!(state.get_string(&path("tenant")).unwrap(), "tenant");
        assert_eq!(state.get_string(&path("kubernetes")).unwrap(), "1.28.11");
        assert_eq!(
            state.get_string(&path("created_at")).unwrap(),
            "2024-02-08 08:48:20 +0000 UTC"
        );
        assert_eq!(
            state.get_string(&path("updated_at")).unwrap(),
            "2024-06-09 11:34:37 +0000 UTC"
        );

        let worker = path("workers").index(0);
        assert_eq!(state.get_i64(&worker.clone().attribute("max_size")).unwrap(), 3);
        assert_eq!(state.get_i64(&worker.clone().attribute("max_surge")).unwrap(), 1);
        assert_eq!(
            state.get(&worker.attribute("max_unavailable")),
            Some(&Dynamic::Null)
        );

        let window = path("maintenance").attribute("time_window");
        assert_eq!(state.get_i64(&window.clone().attribute("duration")).unwrap(), 2);
        assert_eq!(
            state
                .get_string(&window.attribute("begin").attribute("time_zone"))
                .unwrap(),
            "UTC"
        );

        // the mapped state reads back into the same model
        let model = ClusterModel::from_value(&state).unwrap();
        assert_eq!(model.workers[0].max_surge, Some(1));
        assert_eq!(model.maintenance.unwrap().time_window.begin.minute, 30);
    }

    #[test]
    fn patch_drift_keeps_expected_version() {
        let mut state = plan(Dynamic::Null);
        let mut diagnostics = vec![];

        let _ = state.set_string(&AttributePath::new("kubernetes"), "1.28.12");
        reconcile_version(&mut state, "1.28.11", &mut diagnostics);

        assert_eq!(
            state.get_string(&AttributePath::new("kubernetes")).unwrap(),
            "1.28.11"
        );
        assert_eq!(diagnostics.len(), 1);
        assert!(!diagnostics[0].is_error());
        assert_eq!(diagnostics[0].summary, "Upgraded Kubernetes version");

        diagnostics.clear();
        let _ = state.set_string(&AttributePath::new("kubernetes"), "1.29.0");
        reconcile_version(&mut state, "1.28.11", &mut diagnostics);
        assert!(diagnostics.is_empty());
        assert_eq!(
            state.get_string(&AttributePath::new("kubernetes")).unwrap(),
            "1.29.0"
        );
    }
}
