//! Integration tests for subtree serialization, backends and cloning.

use nodebind::core::config::Config;
use nodebind::core::log::{LogLevel, LogQueue};
use nodebind::core::types::{BrowseName, NodeId, ReferenceKind};
use nodebind::core::value::{Value, ValueType};
use nodebind::schema::TypeSchema;
use nodebind::serializer::{create_serializer, MemorySerializer, SerializeError, TreeSerializer};
use nodebind::space::{AddressSpace, CloneOptions, NodeType};
use nodebind::store::MemoryStore;
use tempfile::TempDir;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn sensor_space() -> AddressSpace<MemoryStore> {
    init_logging();
    let mut space = AddressSpace::in_memory().unwrap();
    space
        .register_type(
            TypeSchema::object_type("TemperatureSensor")
                .value_with_default("value", ValueType::Double, Value::Double(0.0))
                .value("units", ValueType::String)
                .child("Limits", "BaseObjectType")
                .build(),
        )
        .unwrap();
    space
}

fn sensor(space: &mut AddressSpace<MemoryStore>) -> NodeId {
    let objects = space.objects_folder().clone();
    space
        .create_instance(
            "TemperatureSensor",
            &objects,
            "Sensor1",
            Some(NodeId::string(1, "sensor1")),
        )
        .unwrap()
}

#[test]
fn attribute_maps_differ_only_in_written_value() {
    let mut space = sensor_space();
    let sensor = sensor(&mut space);

    let before = space.attribute_map(&sensor).unwrap();
    space.write_member(&sensor, "value", 42.0).unwrap();
    let after = space.attribute_map(&sensor).unwrap();

    let changed: Vec<_> = before
        .iter()
        .filter(|(k, v)| after.get(*k) != Some(*v))
        .map(|(k, _)| k.as_str())
        .collect();
    assert_eq!(changed, ["value"]);
    assert_eq!(before.len(), after.len());
}

#[test]
fn deserializing_an_old_record_resets_state() {
    let mut space = sensor_space();
    let sensor = sensor(&mut space);
    let mut backend = MemorySerializer::new();
    let mut log = LogQueue::new();
    space.serialize(&sensor, &mut backend, &mut log).unwrap();

    space.write_member(&sensor, "value", 42.0).unwrap();
    space.set_display_name(&sensor, "Hot").unwrap();
    space.deserialize(&sensor, &backend, &mut log).unwrap();

    assert_eq!(space.read_member(&sensor, "value").unwrap(), Value::Double(0.0));
    assert_eq!(space.display_name(&sensor).unwrap(), "Sensor1");
    assert!(log.is_empty());
}

#[test]
fn json_round_trip_into_a_fresh_space() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("sensors.json");
    let config = Config::default();
    let mut log = LogQueue::new();

    let mut space = sensor_space();
    let sensor_id = sensor(&mut space);
    space.write_member(&sensor_id, "value", 18.25).unwrap();
    space.write_member(&sensor_id, "units", "degC").unwrap();
    let limits = space.resolve_path(&sensor_id, "Limits").unwrap();
    space.set_description(&limits, "alarm limits").unwrap();

    let mut backend = create_serializer("json", Some(&path), &config).unwrap();
    assert_eq!(space.serialize(&sensor_id, backend.as_mut(), &mut log).unwrap(), 2);
    backend.flush().unwrap();
    assert!(path.exists());

    let mut restored = sensor_space();
    let fresh = sensor(&mut restored);
    assert_eq!(fresh, sensor_id);
    let fresh_limits = restored.resolve_path(&fresh, "Limits").unwrap();
    assert_eq!(fresh_limits, limits);

    let reader = create_serializer("json", Some(&path), &config).unwrap();
    assert_eq!(restored.deserialize(&fresh, reader.as_ref(), &mut log).unwrap(), 2);
    assert_eq!(restored.read_member(&fresh, "value").unwrap(), Value::Double(18.25));
    assert_eq!(
        restored.read_member(&fresh, "units").unwrap(),
        Value::String("degC".into())
    );
    assert_eq!(restored.description(&fresh_limits).unwrap(), "alarm limits");
    assert!(log.is_empty(), "{:?}", log.entries().collect::<Vec<_>>());
}

#[test]
fn renamed_node_refuses_its_old_record() {
    let mut space = sensor_space();
    let sensor_id = sensor(&mut space);
    let mut backend = MemorySerializer::new();
    let mut log = LogQueue::new();
    space.serialize_node(&sensor_id, &mut backend, &mut log).unwrap();

    let mut other = sensor_space();
    let objects = other.objects_folder().clone();
    other
        .create_instance("TemperatureSensor", &objects, "Sensor2", Some(sensor_id.clone()))
        .unwrap();

    let err = other.deserialize_node(&sensor_id, &backend, &mut log).unwrap_err();
    match err {
        SerializeError::BrowseNameMismatch { expected, found, .. } => {
            assert_eq!(expected, BrowseName::new("Sensor2").unwrap());
            assert_eq!(found, "Sensor1");
        }
        err => panic!("unexpected error: {err}"),
    }
}

#[test]
fn schema_drift_only_warns() {
    let mut space = sensor_space();
    let sensor_id = sensor(&mut space);
    let mut backend = MemorySerializer::new();
    let mut log = LogQueue::new();
    space.serialize_node(&sensor_id, &mut backend, &mut log).unwrap();

    let mut newer = AddressSpace::in_memory().unwrap();
    newer
        .register_type(
            TypeSchema::object_type("TemperatureSensor")
                .value_with_default("value", ValueType::Double, Value::Double(0.0))
                .value("calibrated", ValueType::Boolean)
                .child("Limits", "BaseObjectType")
                .build(),
        )
        .unwrap();
    let fresh = sensor(&mut newer);
    newer.write_member(&fresh, "value", 5.0).unwrap();

    assert!(newer.deserialize_node(&fresh, &backend, &mut log).unwrap());
    assert_eq!(newer.read_member(&fresh, "value").unwrap(), Value::Double(0.0));
    assert_eq!(log.count_at_least(LogLevel::Warning), 2);
}

#[test]
fn clone_preserves_every_outgoing_edge() {
    let mut space = AddressSpace::in_memory().unwrap();
    let objects = space.objects_folder().clone();
    let alarm = space.add_base_object(&objects, "AlarmA").unwrap().id().clone();
    let event = space.add_base_object(&objects, "EventB").unwrap().id().clone();
    let log_node = space.add_base_object(&objects, "LogC").unwrap().id().clone();
    let generates = ReferenceKind::new("Generates", "GeneratedBy").unwrap();
    let notifies = ReferenceKind::new("Notifies", "NotifiedBy").unwrap();
    space.add_reference(&generates, &alarm, &event, true).unwrap();
    space.add_reference(&notifies, &alarm, &log_node, true).unwrap();

    let mut log = LogQueue::new();
    let copy = space
        .clone_node(&alarm, CloneOptions::default().named("AlarmC"), &mut log)
        .unwrap();

    assert_eq!(
        space.find_references(&event, &generates, false).unwrap(),
        vec![alarm.clone(), copy.clone()]
    );
    assert_eq!(
        space.find_references(&log_node, &notifies, false).unwrap(),
        vec![alarm, copy.clone()]
    );
    assert_eq!(space.node(&copy).unwrap().edge_count(), 2);
    assert!(log.is_empty());
}
