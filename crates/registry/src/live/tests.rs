use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use serde_json::json;

use super::*;
use crate::routes::RouteTable;
use crate::test_fixtures::{FixtureCompiler, FixtureComponent, FixtureDialect, FixtureLoader};

fn registry() -> LiveRegistry {
	LiveRegistry::builder(Arc::new(FixtureDialect), Arc::new(FixtureCompiler), Arc::new(FixtureLoader)).build()
}

fn call(registry: &LiveRegistry, identity: &str, method: &str) -> String {
	registry
		.handle(identity)
		.invoke(method, &[])
		.unwrap()
		.as_str()
		.unwrap()
		.to_string()
}

#[test]
fn submit_installs_latest_version() {
	let registry = registry();
	let first = registry.submit(None, "unit Greeter { greet }").unwrap();
	assert_eq!(first.status, SubmitStatus::Registered);
	assert_eq!(first.physical, "Greeter");
	assert_eq!(call(&registry, "Greeter", "greet"), "Greeter");

	let second = registry.submit(Some("Greeter"), "unit Greeter { greet }").unwrap();
	assert_eq!(registry.ledger().latest("Greeter").unwrap(), second.physical);
	assert_eq!(call(&registry, "Greeter", "greet"), second.physical.as_str());
	assert_eq!(
		registry.instances().installed("Greeter").unwrap().physical,
		second.physical
	);
}

#[test]
fn get_source_returns_compiled_text() {
	let registry = registry();
	registry.submit(None, "unit Greeter { greet }").unwrap();
	let second = registry.submit(None, "unit Greeter { greet }").unwrap();

	let expected = format!("unit {} extends Greeter {{ greet }}", second.physical);
	assert_eq!(&*registry.get_source("Greeter").unwrap(), expected.as_str());
	assert_eq!(&*registry.get_source(second.physical.as_str()).unwrap(), expected.as_str());
	assert!(matches!(registry.get_source("Missing"), Err(RegistryError::NotFound(_))));
}

#[test]
fn reload_cascades_one_hop() {
	let registry = registry();
	registry.submit(None, "unit A { a }").unwrap();
	registry.submit(None, "unit B { b A }").unwrap();
	registry.submit(None, "unit C { c B }").unwrap();

	let reload = registry.submit(None, "unit A { a }").unwrap();
	assert_eq!(reload.cascade.len(), 1);
	assert_eq!(reload.cascade[0].identity, "B");
	let b = reload.cascade[0].result.clone().unwrap();
	assert!(registry.get_source("B").unwrap().contains(reload.physical.as_str()));

	assert_eq!(registry.version_history("C").unwrap().len(), 1);
	assert_eq!(registry.ledger().latest("B").unwrap(), b);
}

#[test]
fn cascade_failures_are_isolated() {
	let registry = registry();
	registry.submit(None, "unit A { a }").unwrap();
	registry.submit(None, "unit B { b A }").unwrap();
	registry.submit(None, "unit C { c A }").unwrap();

	// B's next version will name a unit that no longer exists.
	registry.submit(None, "unit Gone { g }").unwrap();
	registry.submit(None, "unit B { b A Gone }").unwrap();
	registry.unregister("Gone");

	let reload = registry.submit(None, "unit A { a }").unwrap();
	let outcomes: Vec<_> = reload
		.cascade
		.iter()
		.map(|r| (r.identity.to_string(), r.result.is_ok()))
		.collect();
	assert_eq!(outcomes, vec![("B".to_string(), false), ("C".to_string(), true)]);
	assert_eq!(call(&registry, "A", "a"), reload.physical.as_str());
}

#[test]
fn cascade_can_be_disabled() {
	let registry = LiveRegistry::builder(Arc::new(FixtureDialect), Arc::new(FixtureCompiler), Arc::new(FixtureLoader))
		.config(RegistryConfig {
			cascade: false,
			..RegistryConfig::default()
		})
		.build();
	registry.submit(None, "unit A { a }").unwrap();
	registry.submit(None, "unit B { b A }").unwrap();
	assert!(registry.submit(None, "unit A { a }").unwrap().cascade.is_empty());
	assert_eq!(registry.version_history("B").unwrap().len(), 1);
}

#[test]
fn compile_failure_keeps_history_but_not_current() {
	let registry = registry();
	let first = registry.submit(None, "unit Greeter { greet }").unwrap();
	let err = registry.submit(None, "unit Greeter { greet !fail }").unwrap_err();
	assert!(matches!(err, RegistryError::Compile { .. }));

	let entries = registry.version_entries("Greeter").unwrap();
	assert_eq!(entries.len(), 2);
	assert_eq!(entries[1].state, VersionState::Failed);
	assert_eq!(registry.ledger().latest("Greeter").unwrap(), first.physical);
	assert_eq!(call(&registry, "Greeter", "greet"), "Greeter");
}

#[test]
fn incompatible_replacement_is_rejected() {
	let registry = registry();
	registry.submit(None, "unit Other { greet }").unwrap();
	registry.submit(None, "unit Greeter { greet }").unwrap();

	let err = registry.submit(None, "unit Greeter extends Other { greet }").unwrap_err();
	assert!(matches!(err, RegistryError::IncompatibleReplacement { .. }));
	assert_eq!(call(&registry, "Greeter", "greet"), "Greeter");
	let entries = registry.version_entries("Greeter").unwrap();
	assert_eq!(entries[1].state, VersionState::Rejected);
	assert_eq!(registry.ledger().latest("Greeter").unwrap(), "Greeter");
}

#[test]
fn passive_units_update_without_instances() {
	let registry = registry();
	registry.submit(None, "unit Greeter { greet }").unwrap();
	let passive = registry.submit(None, "passive unit Greeter { greet }").unwrap();

	assert_eq!(passive.status, SubmitStatus::UpdatedOnly);
	assert!(registry.instances().installed("Greeter").is_none());
	assert_eq!(registry.ledger().latest("Greeter").unwrap(), passive.physical);
}

#[test]
fn unregister_leaves_nothing_behind() {
	let registry = registry();
	registry.submit(None, "unit A { a }").unwrap();
	registry.submit(None, "unit B { b A }").unwrap();

	assert_eq!(registry.unregister("A"), UnregisterStatus::Ok);
	assert_eq!(registry.unregister("A"), UnregisterStatus::NotFound);
	assert!(registry.version_history("A").is_err());
	assert!(registry.get_source("A").is_err());
	assert!(registry.dependents_of("A").is_empty());
	assert!(registry.references_of("B").is_empty());
	assert!(!registry.handle("A").is_live());

	let again = registry.submit(None, "unit A { a }").unwrap();
	assert_eq!(again.physical, "A");
}

#[test]
fn static_fallback_answers_after_unregister() {
	let registry = registry();
	registry.submit(None, "unit Base { greet }").unwrap();
	let base_type = registry.instances().resolve("Base").unwrap().type_info().clone();
	registry.install_static("Greeter", Arc::new(FixtureComponent(base_type)));
	assert_eq!(call(&registry, "Greeter", "greet"), "Base");

	let err = registry.submit(None, "unit Greeter { greet }").unwrap_err();
	assert!(matches!(err, RegistryError::IncompatibleReplacement { .. }));
	registry.unregister("Greeter");

	registry.submit(None, "unit Greeter extends Base { greet }").unwrap();
	assert_eq!(call(&registry, "Greeter", "greet"), "Greeter");
	registry.unregister("Greeter");
	assert_eq!(call(&registry, "Greeter", "greet"), "Base");
}

#[test]
fn discard_refuses_live_version() {
	let registry = registry();
	registry.submit(None, "unit Greeter { greet }").unwrap();
	let v2 = registry.submit(None, "unit Greeter { greet }").unwrap();
	let v3 = registry.submit(None, "unit Greeter { greet }").unwrap();

	let err = registry.discard_version(v3.physical.as_str()).unwrap_err();
	assert!(matches!(err, RegistryError::VersionLive { .. }));

	let removal = registry.discard_version(v2.physical.as_str()).unwrap();
	assert!(!removal.orphaned);
	assert!(registry.get_source(v2.physical.as_str()).is_err());
	assert_eq!(registry.version_history("Greeter").unwrap().len(), 2);

	assert!(matches!(
		registry.discard_version("Nope"),
		Err(RegistryError::NotFound(_))
	));
}

#[test]
fn discarding_original_orphans_identity() {
	let registry = registry();
	registry.submit(None, "unit Greeter { greet }").unwrap();
	registry.submit(None, "unit Greeter { greet }").unwrap();

	let removal = registry.discard_version("Greeter").unwrap();
	assert!(removal.orphaned);
	assert!(registry.version_history("Greeter").is_err());
	assert!(!registry.handle("Greeter").is_live());
}

#[test]
fn routes_follow_installed_instance() {
	let routes = Arc::new(RouteTable::new());
	let registry = LiveRegistry::builder(Arc::new(FixtureDialect), Arc::new(FixtureCompiler), Arc::new(FixtureLoader))
		.rebinder(routes.clone())
		.build();

	registry.submit(None, "unit Greeter { greet route:/greet=greet }").unwrap();
	let directory = registry.directory();
	assert_eq!(routes.dispatch("/greet", directory.as_ref(), &[]).unwrap(), json!("Greeter"));

	let v2 = registry.submit(None, "unit Greeter { greet route:/hello=greet }").unwrap();
	assert!(routes.lookup("/greet").is_some(), "inherited route stays bound");
	assert_eq!(routes.dispatch("/hello", directory.as_ref(), &[]).unwrap(), json!(v2.physical.as_str()));

	let clash = registry.submit(None, "unit Other { o route:/hello=o }").unwrap();
	assert_eq!(clash.warnings.len(), 1);

	let listed = registry.list_units();
	assert!(listed.iter().any(|u| u.identity == "Greeter" && u.routable && u.live));

	registry.unregister("Greeter");
	assert!(routes.lookup("/hello").is_none());
}

#[test]
fn processors_wrap_and_tear_down() {
	#[derive(Default)]
	struct Log(Mutex<Vec<String>>);

	impl InstanceProcessor for Log {
		fn on_install(&self, identity: &Identity, instance: Arc<dyn Component>) -> Option<Arc<dyn Component>> {
			self.0.lock().push(format!("install {identity} {}", instance.type_info().name));
			Some(instance)
		}

		fn on_teardown(&self, identity: &Identity, instance: Arc<dyn Component>) -> Option<Arc<dyn Component>> {
			self.0.lock().push(format!("teardown {identity} {}", instance.type_info().name));
			None
		}
	}

	let log = Arc::new(Log::default());
	let registry = LiveRegistry::builder(Arc::new(FixtureDialect), Arc::new(FixtureCompiler), Arc::new(FixtureLoader))
		.processor(log.clone())
		.build();
	registry.submit(None, "unit Greeter { greet }").unwrap();
	let v2 = registry.submit(None, "unit Greeter { greet }").unwrap();
	registry.unregister("Greeter");

	assert_eq!(
		*log.0.lock(),
		vec![
			"install Greeter Greeter".to_string(),
			format!("install Greeter {}", v2.physical),
			"teardown Greeter Greeter".to_string(),
			format!("teardown Greeter {}", v2.physical),
		]
	);
}

#[test]
fn concurrent_submissions_of_distinct_identities() {
	let registry = registry();
	std::thread::scope(|scope| {
		for t in 0..8 {
			let registry = &registry;
			scope.spawn(move || {
				for _ in 0..5 {
					registry.submit(None, &format!("unit U{t} {{ go }}")).unwrap();
				}
			});
		}
	});
	for t in 0..8 {
		let id = format!("U{t}");
		assert_eq!(registry.version_history(&id).unwrap().len(), 5);
		let latest = registry.ledger().latest(&id).unwrap();
		assert_eq!(call(&registry, &id, "go"), latest.as_str());
	}
}

#[test]
fn discarding_current_passive_version_restores_references() {
	let registry = registry();
	registry.submit(None, "unit Helper { help }").unwrap();
	registry.submit(None, "passive unit Tool { use Helper }").unwrap();
	let v2 = registry.submit(None, "passive unit Tool { use }").unwrap();
	assert!(registry.references_of("Tool").is_empty());
	assert!(registry.dependents_of("Helper").is_empty());

	let removal = registry.discard_version(v2.physical.as_str()).unwrap();
	assert!(removal.was_current);
	assert_eq!(registry.ledger().latest("Tool").unwrap(), "Tool");
	assert_eq!(registry.references_of("Tool"), vec![Identity::from("Helper")]);
	assert_eq!(registry.dependents_of("Helper"), vec![Identity::from("Tool")]);
}

#[test]
fn unregister_before_swap_leaves_no_instance() {
	let registry = registry();
	let rw = registry
		.locks
		.with("Greeter", || registry.rewriter.rewrite(None, "unit Greeter { greet }"))
		.unwrap();
	assert_eq!(registry.unregister("Greeter"), UnregisterStatus::Ok);

	let err = registry.realize(&rw).unwrap_err();
	assert!(matches!(err, RegistryError::NotFound(_)));
	assert!(registry.instances().installed("Greeter").is_none());
	assert!(!registry.handle("Greeter").is_live());
	assert!(registry.list_units().is_empty());
}
