use pretty_assertions::assert_eq;

use super::*;
use crate::bridge::NoSymbols;
use crate::ledger::VersionState;
use crate::test_fixtures::{FixtureDialect, StaticNames};

struct Fixture {
	ledger: Arc<VersionLedger>,
	graph: Arc<ReferenceGraph>,
	store: Arc<SourceStore>,
	rewriter: Rewriter,
}

fn fixture_with(statics: Arc<dyn SymbolResolver>, config: RegistryConfig) -> Fixture {
	let ledger = Arc::new(VersionLedger::new());
	let graph = Arc::new(ReferenceGraph::new());
	let store = Arc::new(SourceStore::new());
	let rewriter = Rewriter::new(
		Arc::new(FixtureDialect),
		ledger.clone(),
		graph.clone(),
		store.clone(),
		statics,
		config,
	);
	Fixture {
		ledger,
		graph,
		store,
		rewriter,
	}
}

fn fixture() -> Fixture {
	fixture_with(Arc::new(NoSymbols), RegistryConfig::default())
}

/// Reserves and marks the version live, as a successful pipeline would.
fn submit_live(f: &Fixture, source: &str) -> Rewrite {
	let rw = f.rewriter.rewrite(None, source).unwrap();
	f.ledger.mark(rw.physical.as_str(), VersionState::Live);
	rw
}

#[test]
fn first_submission_keeps_its_name() {
	let f = fixture();
	let rw = f.rewriter.rewrite(None, "unit Greeter { greet }").unwrap();

	assert_eq!(rw.identity, "Greeter");
	assert_eq!(rw.physical, "Greeter");
	assert!(!rw.reload);
	assert_eq!(&*rw.source, "unit Greeter { greet }");
	assert_eq!(f.store.source("Greeter").as_deref(), Some("unit Greeter { greet }"));
	assert_eq!(f.ledger.entry("Greeter").unwrap().state, VersionState::Reserved);
}

#[test]
fn reload_renames_and_attaches_base() {
	let f = fixture();
	submit_live(&f, "unit Greeter { greet }");
	let rw = f.rewriter.rewrite(None, "unit Greeter { greet wave }").unwrap();

	assert!(rw.reload);
	assert_eq!(rw.identity, "Greeter");
	assert!(rw.physical.as_str().starts_with("Greeter_"));
	assert_eq!(
		&*rw.source,
		format!("unit {} extends Greeter {{ greet wave }}", rw.physical).as_str()
	);
	assert_eq!(f.ledger.latest("Greeter").unwrap(), rw.physical);
}

#[test]
fn reload_keeps_declared_parent() {
	let f = fixture();
	submit_live(&f, "unit Greeter { greet }");
	let rw = f.rewriter.rewrite(None, "unit Greeter extends Other { greet }").unwrap();
	assert_eq!(&*rw.source, format!("unit {} extends Other {{ greet }}", rw.physical).as_str());
}

#[test]
fn parent_synthesis_can_be_disabled() {
	let config = RegistryConfig {
		synthesize_parent: false,
		..RegistryConfig::default()
	};
	let f = fixture_with(Arc::new(NoSymbols), config);
	submit_live(&f, "unit Greeter { greet }");
	let rw = f.rewriter.rewrite(None, "unit Greeter { greet }").unwrap();
	assert_eq!(&*rw.source, format!("unit {} {{ greet }}", rw.physical).as_str());
}

#[test]
fn no_base_means_no_parent() {
	let f = fixture();
	let first = f.rewriter.rewrite(None, "unit Greeter { greet }").unwrap();
	f.ledger.mark(first.physical.as_str(), VersionState::Failed);

	let rw = f.rewriter.rewrite(None, "unit Greeter { greet }").unwrap();
	assert!(rw.reload);
	assert_eq!(&*rw.source, format!("unit {} {{ greet }}", rw.physical).as_str());
}

#[test]
fn physical_versions_are_never_reused() {
	let f = fixture();
	submit_live(&f, "unit Greeter { greet }");
	let mut seen = BTreeSet::new();
	for _ in 0..50 {
		let rw = f.rewriter.rewrite(None, "unit Greeter { greet }").unwrap();
		assert!(seen.insert(rw.physical.clone()), "{} minted twice", rw.physical);
	}
}

#[test]
fn references_point_at_latest_version() {
	let f = fixture();
	submit_live(&f, "unit Greeter { greet }");
	let caller = submit_live(&f, "unit Caller { call Greeter }");
	assert_eq!(caller.references, vec![Identity::from("Greeter")]);
	assert_eq!(f.graph.dependents_of("Greeter"), vec![Identity::from("Caller")]);

	let greeter = submit_live(&f, "unit Greeter { greet }");
	let caller = f.rewriter.rewrite(None, &f.store.source("Caller").unwrap()).unwrap();
	assert_eq!(
		&*caller.source,
		format!("unit {} extends Caller {{ call {} }}", caller.physical, greeter.physical).as_str()
	);
	assert_eq!(caller.references, vec![Identity::from("Greeter")]);
}

#[test]
fn stale_physical_names_are_folded_forward() {
	let f = fixture();
	submit_live(&f, "unit Greeter { greet }");
	let v2 = submit_live(&f, "unit Greeter { greet }");
	let v3 = submit_live(&f, "unit Greeter { greet }");

	let caller = f
		.rewriter
		.rewrite(None, &format!("unit Caller {{ {} }}", v2.physical))
		.unwrap();
	assert_eq!(&*caller.source, format!("unit Caller {{ {} }}", v3.physical).as_str());
}

#[test]
fn physical_self_name_maps_to_identity() {
	let f = fixture();
	submit_live(&f, "unit Greeter { greet }");
	let v2 = submit_live(&f, "unit Greeter { greet }");

	let stored = f.store.source(v2.physical.as_str()).unwrap();
	let rw = f.rewriter.rewrite(Some("Greeter"), &stored).unwrap();
	assert_eq!(rw.identity, "Greeter");
	assert_eq!(&*rw.source, format!("unit {} extends Greeter {{ greet }}", rw.physical).as_str());
}

#[test]
fn malformed_sources_leave_no_trace() {
	let f = fixture();
	let err = f.rewriter.rewrite(None, "fn nothing() {}").unwrap_err();
	assert!(matches!(err, RegistryError::MalformedSource { .. }));

	let err = f.rewriter.rewrite(Some("Other"), "unit Greeter { greet }").unwrap_err();
	assert!(matches!(err, RegistryError::MalformedSource { .. }));
	assert!(f.ledger.all_identities().is_empty());
	assert!(f.store.names().is_empty());
}

#[test]
fn static_units_cannot_be_shadowed() {
	let f = fixture_with(Arc::new(StaticNames(vec!["Base"])), RegistryConfig::default());
	let err = f.rewriter.rewrite(None, "unit Base { greet }").unwrap_err();
	assert_eq!(
		err,
		RegistryError::IdentityConflict {
			identity: Identity::from("Base")
		}
	);
	assert!(!f.ledger.contains("Base"));
}

#[test]
fn escaped_line_endings_are_normalized() {
	let f = fixture();
	let rw = f.rewriter.rewrite(None, "unit Greeter {\\r\\n greet\r\n}").unwrap();
	assert_eq!(&*rw.source, "unit Greeter {\n greet\n}");
}

#[test]
fn rewrite_replaces_referrer_edges() {
	let f = fixture();
	submit_live(&f, "unit A { a }");
	submit_live(&f, "unit B { b }");
	submit_live(&f, "unit Caller { A B }");
	assert_eq!(f.graph.references_of("Caller"), vec![Identity::from("A"), Identity::from("B")]);

	submit_live(&f, "unit Caller { B }");
	assert_eq!(f.graph.references_of("Caller"), vec![Identity::from("B")]);
	assert!(f.graph.dependents_of("A").is_empty());
}

#[test]
fn current_version_always_has_source() {
	let f = fixture();
	submit_live(&f, "unit Greeter { greet }");
	let done = std::sync::atomic::AtomicBool::new(false);

	std::thread::scope(|scope| {
		scope.spawn(|| {
			while !done.load(std::sync::atomic::Ordering::Acquire) {
				let latest = f.ledger.latest("Greeter").unwrap();
				assert!(f.store.source(latest.as_str()).is_some(), "{latest} has no source");
			}
		});
		for _ in 0..200 {
			f.rewriter.rewrite(None, "unit Greeter { greet }").unwrap();
		}
		done.store(true, std::sync::atomic::Ordering::Release);
	});
}

#[test]
fn recorded_source_is_never_overwritten() {
	let f = fixture();
	f.store.insert(SourceRecord {
		identity: Identity::from("Stale"),
		physical: PhysicalVersion::from("Greeter"),
		source: Arc::from("unit Stale { }"),
		artifact: None,
	});

	let err = f.rewriter.rewrite(None, "unit Greeter { greet }").unwrap_err();
	assert!(matches!(err, RegistryError::Integrity(_)));
	assert_eq!(f.store.source("Greeter").as_deref(), Some("unit Stale { }"));
	assert!(!f.ledger.contains("Greeter"));
}
