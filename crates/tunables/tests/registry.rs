//! End-to-end registry scenarios: layered loading, sectioned parsing,
//! rejection semantics, presets, serialization round-trips.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tunables::properties::PresetModification;
use tunables::validators::{EnumerationValidator, RangeValidator};
use tunables::{
	EnumDictionary, EnumValue, PropError, Properties, PropertyDef, PropertyFlags, RegistryHooks,
	Source, StoreFlags, UnknownFieldPolicy, ValidatorRef,
};

struct NetRegistry {
	reg: Properties,
	retries: tunables::PropKey<i32>,
	mode: tunables::PropKey<EnumValue>,
}

/// `retries:int[0,5]` default 1, `mode:enum{fast,slow}` default `fast`.
fn net_registry() -> NetRegistry {
	let dict = Arc::new(EnumDictionary::new(&[(0, "fast"), (1, "slow")], true));
	let mut reg = Properties::new("net");
	let retries = reg.define(
		PropertyDef::new("retries", 1i32)
			.desc("connection retry count")
			.validator(ValidatorRef::owned(RangeValidator::bounds(0i32, 5))),
	);
	let mode = reg.define(
		PropertyDef::new("mode", EnumValue::new(0, dict.clone()))
			.desc("transfer mode")
			.validator(ValidatorRef::owned(EnumerationValidator::new(dict))),
	);
	NetRegistry { reg, retries, mode }
}

#[test]
fn test_sectioned_load_rejects_without_mutation() {
	let mut net = net_registry();
	let ok = net
		.reg
		.load_str("[net]\nretries=3\nmode=turbo\n", '=', "net", Source::FILE)
		.unwrap();
	assert!(!ok, "a rejected line fails the load");
	assert_eq!(net.reg.value(net.retries), 3);
	assert_eq!(net.reg.value(net.mode).name(), "fast");
	let rejected = net.reg.rejected_fields();
	assert_eq!(rejected.len(), 1);
	assert_eq!(rejected[0].key, "mode");
	assert_eq!(rejected[0].value, "turbo");
	assert!(net.reg.last_section_found());
}

#[test]
fn test_store_all_persistent_declaration_order() {
	let mut net = net_registry();
	net.reg
		.load_str("[net]\nretries=3\nmode=turbo\n", '=', "net", Source::FILE)
		.unwrap();
	let mut out = String::new();
	net.reg.store(&mut out, '=', "net", StoreFlags::ALL_PERSISTENT);
	assert_eq!(out, "[net]\nretries=3\nmode=fast\n");
}

#[test]
fn test_store_round_trip() {
	let mut a = net_registry();
	assert!(a.reg.set(a.retries, 4));
	let mut text = String::new();
	a.reg.store(&mut text, '=', "net", StoreFlags::ALL_PERSISTENT);

	let mut b = net_registry();
	assert!(b.reg.load_str(&text, '=', "net", Source::FILE).unwrap());
	assert_eq!(b.reg.value(b.retries), 4);
	assert_eq!(b.reg.value(b.mode).name(), "fast");
}

#[test]
fn test_description_output_reloads_cleanly() {
	let mut a = net_registry();
	a.reg.set(a.retries, 2);
	let mut text = String::new();
	a.reg.store(
		&mut text,
		'=',
		"",
		StoreFlags::ALL_PERSISTENT | StoreFlags::DESCRIPTION,
	);
	assert!(text.contains("# connection retry count"));

	let mut b = net_registry();
	assert!(b.reg.load(&text).unwrap());
	assert_eq!(b.reg.value(b.retries), 2);
	assert!(b.reg.rejected_fields().is_empty());
}

#[test]
fn test_load_idempotence() {
	let text = "retries=3\n";
	let mut once = net_registry();
	once.reg.load(text).unwrap();

	let mut twice = net_registry();
	twice.reg.load(text).unwrap();
	twice.reg.load(text).unwrap();

	assert_eq!(once.reg.raw("retries"), twice.reg.raw("retries"));
	assert_eq!(
		once.reg.is_modified("retries"),
		twice.reg.is_modified("retries")
	);
}

#[test]
fn test_unknown_key_tolerance() {
	let mut net = net_registry();
	let ok = net
		.reg
		.load("retries=2\nbogus=1\nmode=slow\n")
		.unwrap();
	assert!(ok, "unknown keys don't count against success");
	assert_eq!(net.reg.value(net.retries), 2);
	assert_eq!(net.reg.value(net.mode).name(), "slow");
	assert_eq!(net.reg.unknown_fields(), &[("bogus".to_string(), "1".to_string())]);
}

#[test]
fn test_unknown_key_abort_policy() {
	let mut net = net_registry();
	net.reg
		.meta_mut()
		.unwrap()
		.set_unknown_field_policy(UnknownFieldPolicy::Abort);
	let err = net.reg.load("bogus=1\n").unwrap_err();
	assert!(matches!(err, PropError::Aborted(_)));
}

#[test]
fn test_out_of_section_lines_are_skipped() {
	let mut net = net_registry();
	let ok = net
		.reg
		.load_str("[disk]\nretries=5\n[net]\nretries=3\n", '=', "net", Source::FILE)
		.unwrap();
	assert!(ok);
	assert_eq!(net.reg.value(net.retries), 3);

	let mut missing = net_registry();
	missing
		.reg
		.load_str("[disk]\nretries=5\n", '=', "net", Source::FILE)
		.unwrap();
	assert!(!missing.reg.last_section_found());
	assert_eq!(missing.reg.value(missing.retries), 1);
}

#[test]
fn test_duplicate_section_policies() {
	let text = "[net]\nretries=1\n[net]\nretries=2\n";

	let mut merged = net_registry();
	merged.reg.load(text).unwrap();
	assert_eq!(merged.reg.value(merged.retries), 2);

	let mut first = net_registry();
	first
		.reg
		.meta_mut()
		.unwrap()
		.set_duplicate_section_policy(tunables::DuplicateSectionPolicy::First);
	first.reg.load(text).unwrap();
	assert_eq!(first.reg.value(first.retries), 1);

	let mut abort = net_registry();
	abort
		.reg
		.meta_mut()
		.unwrap()
		.set_duplicate_section_policy(tunables::DuplicateSectionPolicy::Abort);
	assert!(matches!(abort.reg.load(text), Err(PropError::Aborted(_))));
}

#[test]
fn test_mandatory_enforcement() {
	let mut reg = Properties::new("job");
	reg.define(PropertyDef::new("output", String::new()).mandatory());
	reg.define(PropertyDef::new("threads", 1u32));

	let mut msg = String::new();
	assert!(!reg.validate_mandatory(&mut msg));
	assert!(msg.contains("output"));

	assert!(reg.load("output=/tmp/result\n").unwrap());
	let mut msg = String::new();
	assert!(reg.validate_mandatory(&mut msg));
}

#[test]
fn test_args_front() {
	let mut net = net_registry();
	let args: Vec<String> = ["disk:", "cache=64", "net:", "retries=4", "mode=slow"]
		.map(String::from)
		.into();
	assert!(net.reg.load_args(&args, "net").unwrap());
	assert_eq!(net.reg.value(net.retries), 4);
	assert_eq!(net.reg.value(net.mode).name(), "slow");
	assert!(net.reg.loaded().contains(Source::ARGS));
}

#[test]
fn test_env_front_ignores_foreign_variables() {
	let mut net = net_registry();
	let ok = net
		.reg
		.load_env([("PATH", "/usr/bin"), ("retries", "2")])
		.unwrap();
	assert!(ok);
	assert_eq!(net.reg.value(net.retries), 2);
	assert!(net.reg.unknown_fields().is_empty());
	assert!(net.reg.loaded().contains(Source::ENV));
}

#[test]
fn test_vec_and_canonical_fronts() {
	let mut net = net_registry();
	let pairs: Vec<String> = ["retries=3"].map(String::from).into();
	assert!(net.reg.load_vec(&pairs).unwrap());
	assert_eq!(net.reg.value(net.retries), 3);

	let mut canonical = BTreeMap::new();
	canonical.insert("mode".to_string(), "slow".to_string());
	assert!(net.reg.load_canonical(&canonical).unwrap());
	assert_eq!(net.reg.value(net.mode).name(), "slow");
	assert!(net.reg.loaded().contains(Source::VEC));
}

#[test]
fn test_cut_and_absorb() {
	let mut net = net_registry();
	let mut args: Vec<String> = ["--flag", "retries=3", "other=1"].map(String::from).into();
	assert!(net.reg.cut(&mut args).unwrap());
	assert_eq!(args, ["--flag", "other=1"]);
	assert_eq!(net.reg.value(net.retries), 3);

	let mut injected = Vec::new();
	net.reg.absorb(&mut injected);
	assert_eq!(injected, ["retries=3"]);
}

#[test]
fn test_load_matching() {
	let mut a = net_registry();
	a.reg.load("retries=3\n").unwrap();

	let mut b = net_registry();
	assert!(b.reg.load_matching(&a.reg).unwrap());
	assert_eq!(b.reg.value(b.retries), 3);
	// never-loaded properties are not copied
	assert_eq!(b.reg.value(b.mode).name(), "fast");
}

#[test]
fn test_file_round_trip() {
	let dir = tempfile::tempdir().unwrap();
	let path = dir.path().join("net.ini");

	let mut a = net_registry();
	a.reg.set(a.retries, 5);
	a.reg
		.store_file(&path, '=', "net", StoreFlags::ALL_PERSISTENT)
		.unwrap();

	let mut b = net_registry();
	assert!(b.reg.load_file(&path, '=', "net").unwrap());
	assert_eq!(b.reg.value(b.retries), 5);
	assert_eq!(b.reg.file_name(), path.display().to_string());
}

#[test]
fn test_load_file_failures() {
	let dir = tempfile::tempdir().unwrap();

	let mut net = net_registry();
	let missing = dir.path().join("absent.ini");
	assert!(matches!(
		net.reg.load_file(&missing, '=', ""),
		Err(PropError::Io { .. })
	));
	assert!(net.reg.loaded().contains(Source::FAILED));

	let binary = dir.path().join("binary.ini");
	std::fs::write(&binary, "retries=3\0\n").unwrap();
	assert!(matches!(
		net.reg.load_file(&binary, '=', ""),
		Err(PropError::NotPrintable { .. })
	));
}

#[test]
fn test_preset_modification_tracking() {
	let mut net = net_registry();
	assert!(net.reg.load_presets("[proj]\nretries=2\n", '=', "proj").unwrap());
	assert_eq!(net.reg.preset_modification(), PresetModification::None);
	assert!(net.reg.loaded().contains(Source::PROJECT));

	net.reg.load("retries=4\n").unwrap();
	assert_eq!(net.reg.preset_modification(), PresetModification::Modified);
	let prop = net.reg.find("retries").unwrap();
	assert!(prop.loaded().contains(Source::PRESETS_MODIFIED));

	net.reg.load("retries=9\n").unwrap();
	assert_eq!(
		net.reg.preset_modification(),
		PresetModification::ModifiedFailed
	);
}

#[test]
fn test_reload_presets_restores_preset_values() {
	let mut net = net_registry();
	net.reg.load_presets("retries=2\n", '=', "").unwrap();
	net.reg.load("retries=4\n").unwrap();

	assert!(net.reg.reload_presets().unwrap());
	assert_eq!(net.reg.value(net.retries), 2);
	assert_eq!(net.reg.preset_modification(), PresetModification::None);
	let prop = net.reg.find("retries").unwrap();
	assert!(prop.loaded().contains(Source::PRESETS_OVERWRITTEN));
}

#[test]
fn test_update_presets_keeps_non_preset_overrides() {
	let mut net = net_registry();
	net.reg.load_presets("retries=2\n", '=', "").unwrap();
	net.reg.load("retries=4\n").unwrap();

	assert!(net.reg.update_presets().unwrap());
	assert_eq!(net.reg.value(net.retries), 4, "file override takes precedence");
}

#[test]
fn test_presets_only_store() {
	let mut net = net_registry();
	net.reg.load_presets("retries=2\n", '=', "").unwrap();
	net.reg.load("mode=slow\n").unwrap();

	let mut out = String::new();
	net.reg.store(
		&mut out,
		'=',
		"",
		StoreFlags::ALL_PERSISTENT | StoreFlags::PRESETS_ONLY,
	);
	assert_eq!(out, "retries=2\n");
}

#[test]
fn test_checksum_validation() {
	let mut reg = Properties::new("sealed");
	reg.define(
		PropertyDef::new("limit", 100u32).flags(PropertyFlags::DEFAULT | PropertyFlags::CHECKSUM),
	);
	reg.define(PropertyDef::new("label", "ok".to_string()));

	let expected = reg.checksums();
	assert_eq!(expected.len(), 1);
	let mut msg = String::new();
	assert!(reg.validate_checksum(&mut msg, &expected));

	assert!(reg.set_property("limit", "101"));
	let mut msg = String::new();
	assert!(!reg.validate_checksum(&mut msg, &expected));
	assert!(msg.contains("limit"));
}

#[test]
fn test_volatile_and_checksum_store_selection() {
	let mut reg = Properties::new("mix");
	reg.define(PropertyDef::new("keep", 1i32));
	reg.define(
		PropertyDef::new("scratch", 2i32)
			.flags(PropertyFlags::VOLATILE | PropertyFlags::HIDDEN),
	);
	reg.define(
		PropertyDef::new("sealed", 3i32)
			.flags(PropertyFlags::DEFAULT | PropertyFlags::CHECKSUM),
	);

	let mut plain = String::new();
	reg.store(&mut plain, '=', "", StoreFlags::ALL_PERSISTENT);
	assert_eq!(plain, "keep=1\n");

	let mut full = String::new();
	reg.store(
		&mut full,
		'=',
		"",
		StoreFlags::ALL_PERSISTENT | StoreFlags::NON_PERSISTENT | StoreFlags::CHECKSUM,
	);
	assert_eq!(full, "keep=1\nscratch=2\nsealed=3\n");
}

#[derive(Default)]
struct Recorder {
	events: Arc<Mutex<Vec<String>>>,
}

impl RegistryHooks for Recorder {
	fn on_modified(&mut self, key: &str, value: &str) {
		self.events.lock().push(format!("modified {key}={value}"));
	}

	fn on_rejected(&mut self, key: &str, value: &str, _reason: &str) {
		self.events.lock().push(format!("rejected {key}={value}"));
	}

	fn on_loaded(&mut self) {
		self.events.lock().push("loaded".to_string());
	}
}

#[test]
fn test_hooks_fire_in_commit_order() {
	let mut net = net_registry();
	let events = Arc::new(Mutex::new(Vec::new()));
	net.reg.set_hooks(Box::new(Recorder {
		events: events.clone(),
	}));

	net.reg.load("retries=3\nretries=9\n").unwrap();
	assert_eq!(
		events.lock().as_slice(),
		&["modified retries=3", "rejected retries=9", "loaded"]
	);
}
