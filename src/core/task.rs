//! Running a task once per container.
//!
//! [`run_task_in_containers`] clones one [`IterationRecord`] per target: the
//! resolved command template, the container name, then the caller's overlay.
//! The list is handed to the task's [`Task::iterate`]; the builder itself
//! never runs a command.

use crate::context::{Context, DEFAULT_TEMPLATE_KEY, TEMPLATE_OVERRIDE_KEY};
use crate::defaults::DEFAULT_COMMAND_TEMPLATE;
use crate::error::{Error, Result};
use crate::shell::{CommandOutput, RunOptions};
use crate::utils::args::NameList;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use std::collections::BTreeMap;

pub const COMMAND_TEMPLATE_KEY: &str = "command_template";
pub const CONTAINER_KEY: &str = "container";

/// Caller-supplied entries applied on top of every record, in order.
pub type Overlay = Vec<(String, Value)>;

/// Ordered key/value configuration for one iteration.
///
/// Inserting an existing key replaces its value in place; new keys append.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IterationRecord {
    entries: Vec<(String, Value)>,
}

impl IterationRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        let key = key.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn container(&self) -> Option<&str> {
        self.get(CONTAINER_KEY).and_then(Value::as_str)
    }

    pub fn command_template(&self) -> Option<&str> {
        self.get(COMMAND_TEMPLATE_KEY).and_then(Value::as_str)
    }
}

impl Serialize for IterationRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in &self.entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

// ============================================================================
// Tasks and registries
// ============================================================================

/// Result of iterating a task over its records.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IterationReport {
    pub task: String,
    pub iterations: Vec<IterationOutcome>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IterationOutcome {
    pub record: IterationRecord,
    pub outputs: Vec<CommandOutput>,
}

pub trait Task {
    fn name(&self) -> &str;

    fn description(&self) -> Option<&str> {
        None
    }

    /// Execute the task once per record, in order.
    fn iterate(&self, ctx: &mut Context, iterations: Vec<IterationRecord>) -> Result<IterationReport>;
}

/// Looks tasks up by id.
pub trait TaskRegistry {
    fn get(&self, id: &str) -> Option<&dyn Task>;

    /// Registered ids, used for not-found details.
    fn ids(&self) -> Vec<String>;
}

/// Task definition as stored in dockyard.json.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskDefinition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub commands: Vec<String>,
}

/// A task made of shell commands, run in order inside each record's scope.
#[derive(Debug, Clone)]
pub struct ShellTask {
    pub name: String,
    pub description: Option<String>,
    pub commands: Vec<String>,
}

impl ShellTask {
    pub fn new(name: impl Into<String>, commands: Vec<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            commands,
        }
    }

    pub fn from_definition(name: &str, definition: &TaskDefinition) -> Self {
        Self {
            name: name.to_string(),
            description: definition.description.clone(),
            commands: definition.commands.clone(),
        }
    }
}

impl Task for ShellTask {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    fn iterate(&self, ctx: &mut Context, iterations: Vec<IterationRecord>) -> Result<IterationReport> {
        let mut report = IterationReport {
            task: self.name.clone(),
            iterations: Vec::with_capacity(iterations.len()),
        };

        for record in iterations {
            log_status!(
                "task",
                "{} on {}",
                self.name,
                record.container().unwrap_or("host")
            );

            let outputs = ctx.with_scope(record.clone(), |ctx| {
                self.commands
                    .iter()
                    .map(|command| ctx.run(command, &RunOptions::default()))
                    .collect::<Result<Vec<_>>>()
            })?;

            report.iterations.push(IterationOutcome { record, outputs });
        }

        Ok(report)
    }
}

/// In-memory task registry.
#[derive(Default)]
pub struct TaskSet {
    tasks: BTreeMap<String, Box<dyn Task>>,
}

impl TaskSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_definitions(definitions: &BTreeMap<String, TaskDefinition>) -> Self {
        let mut set = Self::new();
        for (name, definition) in definitions {
            set.register(ShellTask::from_definition(name, definition));
        }
        set
    }

    /// Register a task under its own name, replacing any task with that name.
    pub fn register<T: Task + 'static>(&mut self, task: T) {
        self.tasks.insert(task.name().to_string(), Box::new(task));
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

impl TaskRegistry for TaskSet {
    fn get(&self, id: &str) -> Option<&dyn Task> {
        self.tasks.get(id).map(|task| task.as_ref())
    }

    fn ids(&self) -> Vec<String> {
        self.tasks.keys().cloned().collect()
    }
}

// ============================================================================
// Iteration builder
// ============================================================================

/// `docker_command_template` when set, otherwise the default template.
///
/// Both keys are read from the settings store only; an active scope never
/// changes which template new records get.
pub fn resolve_command_template(ctx: &Context) -> Result<Value> {
    let settings = ctx.settings();
    if let Some(template) = settings.resolve(TEMPLATE_OVERRIDE_KEY, ctx)? {
        return Ok(template);
    }
    if let Some(template) = settings.resolve(DEFAULT_TEMPLATE_KEY, ctx)? {
        return Ok(template);
    }
    Ok(Value::String(DEFAULT_COMMAND_TEMPLATE.to_string()))
}

/// One record per target, in target order. Overlay entries win over
/// `command_template` and `container`.
pub fn build_iterations(
    ctx: &Context,
    targets: impl Into<NameList>,
    overlay: &[(String, Value)],
) -> Result<Vec<IterationRecord>> {
    let targets = targets.into();
    let mut iterations = Vec::with_capacity(targets.len());

    for name in &targets {
        let mut record = IterationRecord::new();
        record.insert(COMMAND_TEMPLATE_KEY, resolve_command_template(ctx)?);
        record.insert(CONTAINER_KEY, Value::String(name.clone()));

        for (key, value) in overlay {
            if key == COMMAND_TEMPLATE_KEY || key == CONTAINER_KEY {
                log_status!("task", "Overlay replaces '{}' for {}", key, name);
            }
            record.insert(key.clone(), value.clone());
        }

        iterations.push(record);
    }

    Ok(iterations)
}

/// Look up `task_id`, build one record per target and iterate the task over them.
///
/// An unknown task fails before any record is built.
pub fn run_task_in_containers(
    ctx: &mut Context,
    registry: &dyn TaskRegistry,
    task_id: &str,
    targets: impl Into<NameList>,
    overlay: &[(String, Value)],
) -> Result<IterationReport> {
    let task = registry
        .get(task_id)
        .ok_or_else(|| Error::task_not_found(task_id, registry.ids()))?;

    let iterations = build_iterations(ctx, targets, overlay)?;
    task.iterate(ctx, iterations)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::testing::context;
    use serde_json::json;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Task that only remembers the records it was handed.
    struct CapturingTask {
        name: String,
        seen: Rc<RefCell<Vec<Vec<IterationRecord>>>>,
    }

    impl Task for CapturingTask {
        fn name(&self) -> &str {
            &self.name
        }

        fn iterate(&self, _ctx: &mut Context, iterations: Vec<IterationRecord>) -> Result<IterationReport> {
            self.seen.borrow_mut().push(iterations);
            Ok(IterationReport {
                task: self.name.clone(),
                iterations: Vec::new(),
            })
        }
    }

    fn capturing_registry() -> (TaskSet, Rc<RefCell<Vec<Vec<IterationRecord>>>>) {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut set = TaskSet::new();
        set.register(CapturingTask {
            name: "deploy:cache".to_string(),
            seen: Rc::clone(&seen),
        });
        (set, seen)
    }

    #[test]
    fn one_record_per_target_in_order() {
        let (mut ctx, _shell) = context();
        let (registry, seen) = capturing_registry();

        run_task_in_containers(&mut ctx, &registry, "deploy:cache", vec!["web", "worker", "cron"], &[])
            .unwrap();

        let calls = seen.borrow();
        assert_eq!(calls.len(), 1);
        let containers: Vec<&str> = calls[0].iter().filter_map(|r| r.container()).collect();
        assert_eq!(containers, vec!["web", "worker", "cron"]);
        for record in &calls[0] {
            assert_eq!(record.command_template(), Some(DEFAULT_COMMAND_TEMPLATE));
            assert_eq!(record.keys().collect::<Vec<_>>(), vec!["command_template", "container"]);
        }
    }

    #[test]
    fn single_target_string_is_one_record() {
        let (ctx, _shell) = context();
        let records = build_iterations(&ctx, "app", &[]).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].container(), Some("app"));
    }

    #[test]
    fn template_override_applies_to_every_record() {
        let (mut ctx, _shell) = context();
        ctx.set(DEFAULT_TEMPLATE_KEY, json!("default"));
        ctx.set(TEMPLATE_OVERRIDE_KEY, json!("X"));

        let records = build_iterations(&ctx, vec!["a", "b"], &[]).unwrap();
        assert!(records.iter().all(|r| r.command_template() == Some("X")));
    }

    #[test]
    fn configured_default_template_is_used_without_override() {
        let (mut ctx, _shell) = context();
        ctx.set(DEFAULT_TEMPLATE_KEY, json!("docker exec {{container}} sh -c {{?command}}"));

        let records = build_iterations(&ctx, "a", &[]).unwrap();
        assert_eq!(
            records[0].command_template(),
            Some("docker exec {{container}} sh -c {{?command}}")
        );
    }

    #[test]
    fn overlay_appends_in_caller_order_and_wins() {
        let (ctx, _shell) = context();
        let overlay: Overlay = vec![
            ("release".to_string(), json!("2024-01")),
            ("container".to_string(), json!("renamed")),
            ("command_template".to_string(), json!("T")),
            ("replicas".to_string(), json!(2)),
        ];

        let records = build_iterations(&ctx, vec!["a", "b"], &overlay).unwrap();
        for record in &records {
            assert_eq!(record.container(), Some("renamed"));
            assert_eq!(record.command_template(), Some("T"));
            assert_eq!(record.get("replicas"), Some(&json!(2)));
            assert_eq!(
                record.keys().collect::<Vec<_>>(),
                vec!["command_template", "container", "release", "replicas"]
            );
        }
    }

    #[test]
    fn unknown_task_builds_nothing() {
        let (mut ctx, shell) = context();
        let (registry, seen) = capturing_registry();

        let err = run_task_in_containers(&mut ctx, &registry, "nonexistent", "a", &[]).unwrap_err();

        assert_eq!(err.code, crate::ErrorCode::TaskNotFound);
        assert_eq!(err.details["known"][0], "deploy:cache");
        assert!(seen.borrow().is_empty());
        assert!(shell.lines().is_empty());
    }

    #[test]
    fn empty_target_list_still_iterates_once() {
        let (mut ctx, shell) = context();
        let (registry, seen) = capturing_registry();

        let report =
            run_task_in_containers(&mut ctx, &registry, "deploy:cache", Vec::<String>::new(), &[]).unwrap();

        assert_eq!(report.task, "deploy:cache");
        let calls = seen.borrow();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].is_empty());
        assert!(shell.lines().is_empty());
    }

    #[test]
    fn unknown_task_with_no_targets_is_not_found() {
        let (mut ctx, _shell) = context();
        let (registry, seen) = capturing_registry();

        let err = run_task_in_containers(&mut ctx, &registry, "nonexistent", Vec::<String>::new(), &[])
            .unwrap_err();

        assert_eq!(err.code, crate::ErrorCode::TaskNotFound);
        assert!(seen.borrow().is_empty());
    }

    #[test]
    fn active_scope_does_not_change_template() {
        let (mut ctx, _shell) = context();
        ctx.set(TEMPLATE_OVERRIDE_KEY, json!("X"));

        let mut scope = IterationRecord::new();
        scope.insert(TEMPLATE_OVERRIDE_KEY, json!("from-scope"));
        scope.insert(DEFAULT_TEMPLATE_KEY, json!("from-scope-default"));

        let records = ctx
            .with_scope(scope, |ctx| build_iterations(ctx, vec!["a", "b"], &[]))
            .unwrap();
        assert!(records.iter().all(|r| r.command_template() == Some("X")));
    }

    #[test]
    fn scoped_override_is_ignored_without_store_override() {
        let (mut ctx, _shell) = context();
        let mut scope = IterationRecord::new();
        scope.insert(TEMPLATE_OVERRIDE_KEY, json!("from-scope"));

        let records = ctx.with_scope(scope, |ctx| build_iterations(ctx, "a", &[])).unwrap();
        assert_eq!(records[0].command_template(), Some(DEFAULT_COMMAND_TEMPLATE));
    }

    #[test]
    fn shell_task_runs_commands_inside_each_container() {
        let (mut ctx, shell) = context();
        ctx.set("bin/docker", json!("docker"));
        let mut registry = TaskSet::new();
        registry.register(ShellTask::new(
            "cache:clear",
            vec!["php artisan cache:clear".to_string(), "php artisan config:cache".to_string()],
        ));

        let report =
            run_task_in_containers(&mut ctx, &registry, "cache:clear", vec!["web", "worker"], &[]).unwrap();

        assert_eq!(report.iterations.len(), 2);
        assert_eq!(report.iterations[1].outputs.len(), 2);
        assert_eq!(
            shell.lines(),
            vec![
                "docker exec -i web bash -c 'php artisan cache:clear'",
                "docker exec -i web bash -c 'php artisan config:cache'",
                "docker exec -i worker bash -c 'php artisan cache:clear'",
                "docker exec -i worker bash -c 'php artisan config:cache'",
            ]
        );
        assert!(ctx.scope().is_none());
    }

    #[test]
    fn overlay_values_are_available_to_commands() {
        let (mut ctx, shell) = context();
        ctx.set("bin/docker", json!("docker"));
        let mut registry = TaskSet::new();
        registry.register(ShellTask::new("migrate", vec!["cd {{app_dir}} && php artisan migrate".to_string()]));

        run_task_in_containers(
            &mut ctx,
            &registry,
            "migrate",
            "app",
            &[("app_dir".to_string(), json!("/srv/app"))],
        )
        .unwrap();

        assert_eq!(
            shell.lines(),
            vec!["docker exec -i app bash -c 'cd /srv/app && php artisan migrate'"]
        );
    }

    #[test]
    fn shell_task_stops_at_first_failure() {
        let (mut ctx, shell) = context();
        ctx.set("bin/docker", json!("docker"));
        shell.reply(false, "");
        let mut registry = TaskSet::new();
        registry.register(ShellTask::new("fails", vec!["false".to_string(), "echo after".to_string()]));

        let err = run_task_in_containers(&mut ctx, &registry, "fails", vec!["a", "b"], &[]).unwrap_err();

        assert_eq!(err.code, crate::ErrorCode::RemoteCommandFailed);
        assert_eq!(err.details["target"]["container"], "a");
        assert_eq!(shell.lines().len(), 1);
        assert!(ctx.scope().is_none());
    }

    #[test]
    fn record_serializes_as_ordered_map() {
        let mut record = IterationRecord::new();
        record.insert("z", json!(1));
        record.insert("a", json!(2));
        record.insert("z", json!(3));
        assert_eq!(serde_json::to_string(&record).unwrap(), r#"{"z":3,"a":2}"#);
    }

    #[test]
    fn task_set_from_definitions() {
        let mut definitions = BTreeMap::new();
        definitions.insert(
            "cache:clear".to_string(),
            TaskDefinition {
                description: Some("Clear caches".to_string()),
                commands: vec!["php artisan cache:clear".to_string()],
            },
        );
        let set = TaskSet::from_definitions(&definitions);
        let task = set.get("cache:clear").unwrap();
        assert_eq!(task.description(), Some("Clear caches"));
        assert_eq!(set.ids(), vec!["cache:clear".to_string()]);
    }
}
