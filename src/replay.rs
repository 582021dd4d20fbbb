//! Scripted editing sessions.
//!
//! A script names one form and a list of steps, e.g.
//!
//! ```yaml
//! form: case_history
//! steps:
//!   - bind: patient-001
//!   - set: { field: identification_name, value: Asha }
//!   - wait_ms: 2500
//!   - save_now
//! ```

use anyhow::Context;
use practice_core::{
    Autosave, AutosaveConfig, FileStore, FormKind, PersistedId, PersistenceBackend, SaveStatus,
    TargetIdentity,
};
use serde::Deserialize;
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

const SETTLE_POLL: Duration = Duration::from_millis(25);

#[derive(Debug, Deserialize)]
pub struct Script {
    pub form: FormKind,
    #[serde(with = "serde_yaml::with::singleton_map_recursive")]
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    /// Bind to a target, starting from the form defaults.
    Bind(String),
    /// Bind to a target and load its stored document.
    Load(String),
    Set { field: String, value: Value },
    Push { field: String, value: Value },
    Remove { field: String, index: usize },
    WaitMs(u64),
    SaveNow,
}

pub fn parse(text: &str) -> anyhow::Result<Script> {
    serde_yaml::from_str(text).context("invalid replay script")
}

/// Run the script at `path` against the file store under `data_dir`.
///
/// Status changes are printed as they happen. Returns the persisted id of the session once
/// any pending autosave has landed.
pub async fn run(
    path: &Path,
    data_dir: &Path,
    config: AutosaveConfig,
) -> anyhow::Result<Option<PersistedId>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let script = parse(&text)?;

    let store = Arc::new(FileStore::new(data_dir, script.form));
    let autosave = Autosave::new(store, script.form, config);

    let mut status = autosave.subscribe();
    let printer = tokio::spawn(async move {
        while status.changed().await.is_ok() {
            let current = *status.borrow_and_update();
            println!("status: {:?} {}", current, current.label());
        }
    });

    for (n, step) in script.steps.into_iter().enumerate() {
        tracing::debug!("step {}: {:?}", n + 1, step);
        apply(&autosave, step)
            .await
            .with_context(|| format!("step {} failed", n + 1))?;
    }

    settle(&autosave).await;
    let persisted = autosave.persisted_id();
    autosave.close();
    tokio::task::yield_now().await;
    printer.abort();

    Ok(persisted)
}

async fn apply<B: PersistenceBackend>(autosave: &Autosave<B>, step: Step) -> anyhow::Result<()> {
    match step {
        Step::Bind(target) => {
            autosave.bind_to(TargetIdentity::new(&target)?, None);
        }
        Step::Load(target) => {
            match autosave.bind_and_load(TargetIdentity::new(&target)?).await? {
                Some(id) => println!("Loaded {} document {}", autosave.form(), id),
                None => println!("No stored {} document for {}", autosave.form(), target),
            }
        }
        Step::Set { field, value } => autosave.set(&field, value)?,
        Step::Push { field, value } => autosave.push_item(&field, value)?,
        Step::Remove { field, index } => {
            autosave.remove_item(&field, index)?;
        }
        Step::WaitMs(ms) => tokio::time::sleep(Duration::from_millis(ms)).await,
        Step::SaveNow => {
            let receipt = autosave.save_now().await?;
            let verb = if receipt.created { "Created" } else { "Updated" };
            println!("{} document {}", verb, receipt.id);
        }
    }
    Ok(())
}

/// Wait until no autosave is pending or in flight.
async fn settle<B: PersistenceBackend>(autosave: &Autosave<B>) {
    while matches!(
        autosave.status(),
        SaveStatus::Debouncing | SaveStatus::Saving
    ) {
        tokio::time::sleep(SETTLE_POLL).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_parse_script() {
        let script = parse(
            r#"
form: plan_of_assessment
steps:
  - load: patient-001
  - push: { field: plan_of_assessment, value: { test: MMSE, notes: "" } }
  - remove: { field: plan_of_assessment, index: 0 }
  - wait_ms: 10
  - save_now
"#,
        )
        .unwrap();

        assert_eq!(script.form, FormKind::PlanOfAssessment);
        assert_eq!(
            script.steps,
            vec![
                Step::Load("patient-001".into()),
                Step::Push {
                    field: "plan_of_assessment".into(),
                    value: json!({"test": "MMSE", "notes": ""}),
                },
                Step::Remove {
                    field: "plan_of_assessment".into(),
                    index: 0,
                },
                Step::WaitMs(10),
                Step::SaveNow,
            ]
        );
    }

    #[test]
    fn test_parse_rejects_unknown_step() {
        assert!(parse("form: case_history\nsteps:\n  - publish: now\n").is_err());
    }

    #[tokio::test]
    async fn test_run_persists_and_reloads() {
        let temp_dir = TempDir::new().unwrap();
        let script_path = temp_dir.path().join("script.yaml");
        std::fs::write(
            &script_path,
            r#"
form: case_history
steps:
  - bind: patient-001
  - set: { field: identification_name, value: Asha }
  - save_now
  - set: { field: identification_age, value: "61" }
"#,
        )
        .unwrap();

        let data_dir = temp_dir.path().join("data");
        let config = AutosaveConfig::new(
            Duration::from_millis(20),
            Duration::from_millis(20),
            Duration::from_millis(20),
        )
        .unwrap();

        let id = run(&script_path, &data_dir, config)
            .await
            .unwrap()
            .expect("document should be persisted");

        let store = FileStore::new(&data_dir, FormKind::CaseHistory);
        let record = store.read(&id).await.unwrap();
        assert_eq!(record.target.as_str(), "patient-001");
        assert_eq!(record.body["identification_name"], json!("Asha"));
        assert_eq!(record.body["identification_age"], json!(61));
        assert_eq!(store.list().await.unwrap().len(), 1);
    }
}
