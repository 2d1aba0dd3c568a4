use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use tracing_subscriber::EnvFilter;

use ddsgraph::{
    ActivityFilter, CancellationToken, DiscoveryEvent, DiscoveryListener, DiscoveryNotification, DiscoveryStatus,
    EndpointInfo, EntityId, EntityKind, ExecutionError, GraphError, Guid, MonitorBackend, ParticipantInfo, TopicInfo,
};

const WAIT: Option<Duration> = Some(Duration::from_secs(10));

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn participant(name: &str, host: &str, process: &str) -> ParticipantInfo {
    ParticipantInfo {
        guid: Guid::random(),
        name: name.to_string(),
        host: host.to_string(),
        user: "user".to_string(),
        process: process.to_string(),
        pid: None,
    }
}

fn topic(name: &str) -> TopicInfo {
    TopicInfo {
        name: name.to_string(),
        data_type: format!("{name}Type"),
    }
}

fn endpoint(name: &str, owner: &ParticipantInfo, topic_name: &str, locators: &[&str]) -> EndpointInfo {
    EndpointInfo {
        guid: Guid::random(),
        name: name.to_string(),
        participant: owner.clone(),
        topic: topic(topic_name),
        locators: locators.iter().map(ToString::to_string).collect(),
    }
}

fn ids(backend: &MonitorBackend, kind: EntityKind, origin: EntityId) -> BTreeSet<EntityId> {
    backend.get_entity_ids(kind, origin).unwrap()
}

fn only(backend: &MonitorBackend, kind: EntityKind, origin: EntityId) -> EntityId {
    let set = ids(backend, kind, origin);
    assert_eq!(set.len(), 1, "expected one {kind}");
    *set.iter().next().unwrap()
}

/// Two participants in two processes of one host, each with a writer per
/// topic and three locators; participant 1 also reads the first topic.
struct Population {
    participants: Vec<ParticipantInfo>,
    topics: Vec<TopicInfo>,
    writers: Vec<EndpointInfo>,
    readers: Vec<EndpointInfo>,
}

impl Population {
    const TOPICS: [&'static str; 3] = ["alpha", "beta", "gamma"];

    fn new() -> Self {
        let participants = vec![
            participant("p0", "host", "proc0"),
            participant("p1", "host", "proc1"),
        ];
        let locators = |idx: usize| -> Vec<String> { (0..3).map(|l| format!("UDPv4:[10.0.0.{idx}]:{}", 7410 + l)).collect() };

        let mut writers = Vec::new();
        for (idx, p) in participants.iter().enumerate() {
            let locs = locators(idx);
            let locs: Vec<&str> = locs.iter().map(String::as_str).collect();
            for t in Self::TOPICS {
                writers.push(endpoint(&format!("{}_{t}_w", p.name), p, t, &locs));
            }
        }
        let locs = locators(1);
        let locs: Vec<&str> = locs.iter().map(String::as_str).collect();
        let readers = vec![endpoint("p1_alpha_r", &participants[1], "alpha", &locs[..1])];

        Self {
            participants,
            topics: Self::TOPICS.iter().map(|t| topic(t)).collect(),
            writers,
            readers,
        }
    }

    fn discoverable(&self) -> i64 {
        (self.participants.len() + self.topics.len() + self.writers.len() + self.readers.len()) as i64
    }

    fn notifications(&self, domain: EntityId, status: DiscoveryStatus) -> Vec<DiscoveryNotification> {
        let mut out = Vec::new();
        out.extend(
            self.participants
                .iter()
                .map(|p| DiscoveryNotification::participant(domain, status, p.clone())),
        );
        out.extend(
            self.topics
                .iter()
                .map(|t| DiscoveryNotification::topic(domain, status, t.clone())),
        );
        out.extend(
            self.writers
                .iter()
                .map(|w| DiscoveryNotification::writer(domain, status, w.clone())),
        );
        out.extend(
            self.readers
                .iter()
                .map(|r| DiscoveryNotification::reader(domain, status, r.clone())),
        );
        out
    }
}

#[test]
fn monitor_lifecycle_discover_undiscover_stop_clear() {
    init_tracing();
    let backend = MonitorBackend::with_default_config().unwrap();
    for kind in EntityKind::VALID {
        assert!(ids(&backend, kind, EntityId::all()).is_empty());
    }

    let domain = backend.start_monitor(42, None).unwrap();
    assert_eq!(ids(&backend, EntityKind::Domain, EntityId::all()), BTreeSet::from([domain]));
    assert!(backend.is_active(domain).unwrap());
    for kind in EntityKind::VALID.into_iter().filter(|k| *k != EntityKind::Domain) {
        assert!(ids(&backend, kind, EntityId::all()).is_empty());
    }

    // Discovery
    let population = Population::new();
    for n in population.notifications(domain, DiscoveryStatus::Discovered) {
        backend.submit(n).unwrap();
    }
    let token = CancellationToken::new();
    let count = backend
        .wait_for_count(|c| c >= population.discoverable(), &token, WAIT)
        .unwrap();
    assert_eq!(count, population.discoverable());
    backend.flush().unwrap();

    for (kind, expected) in [
        (EntityKind::Host, 1),
        (EntityKind::User, 1),
        (EntityKind::Process, 2),
        (EntityKind::Participant, 2),
        (EntityKind::Topic, 3),
        (EntityKind::DataWriter, 6),
        (EntityKind::DataReader, 1),
        (EntityKind::Locator, 6),
    ] {
        assert_eq!(ids(&backend, kind, EntityId::all()).len(), expected, "{kind}");
        assert_eq!(ids(&backend, kind, domain).len(), expected, "{kind} from domain");
        assert_eq!(
            backend
                .get_entity_ids_filtered(kind, domain, ActivityFilter::Inactive)
                .unwrap()
                .len(),
            0,
            "{kind} should all be active"
        );
    }
    assert_eq!(backend.rejected_notifications(), 0);

    // Undiscovery
    for n in population.notifications(domain, DiscoveryStatus::Removed) {
        backend.submit(n).unwrap();
    }
    assert_eq!(backend.wait_for_count(|c| c == 0, &token, WAIT).unwrap(), 0);
    backend.flush().unwrap();
    assert!(backend.is_active(domain).unwrap());
    for kind in EntityKind::VALID.into_iter().filter(|k| *k != EntityKind::Domain) {
        assert!(
            backend
                .get_entity_ids_filtered(kind, domain, ActivityFilter::Active)
                .unwrap()
                .is_empty(),
            "{kind} should all be inactive"
        );
    }

    // Stop
    let before: Vec<BTreeSet<EntityId>> = EntityKind::VALID.iter().map(|k| ids(&backend, *k, domain)).collect();
    backend.stop_monitor(domain).unwrap();
    let after: Vec<BTreeSet<EntityId>> = EntityKind::VALID.iter().map(|k| ids(&backend, *k, domain)).collect();
    assert_eq!(before, after);
    for kind in EntityKind::VALID {
        assert!(backend
            .get_entity_ids_filtered(kind, EntityId::all(), ActivityFilter::Active)
            .unwrap()
            .is_empty());
    }

    // Clear
    backend.clear_monitor(domain).unwrap();
    for kind in EntityKind::VALID {
        assert!(ids(&backend, kind, EntityId::all()).is_empty(), "{kind} left after clear");
    }
    assert!(backend.get_entity(domain).unwrap_err().is_not_found());
    assert_eq!(backend.discovery_count().unwrap(), 0);
}

#[test]
fn reference_scenario_queries() {
    let backend = MonitorBackend::with_default_config().unwrap();
    let d = backend.start_monitor(0, None).unwrap();
    let p = participant("P", "H", "X");
    let reader = endpoint("Rd", &p, "T", &["L1"]);
    let writer = endpoint("Wr", &p, "T", &["L2"]);
    backend
        .apply(&DiscoveryNotification::reader(d, DiscoveryStatus::Discovered, reader))
        .unwrap();
    backend
        .apply(&DiscoveryNotification::writer(d, DiscoveryStatus::Discovered, writer))
        .unwrap();

    let host = only(&backend, EntityKind::Host, EntityId::all());
    let rd = only(&backend, EntityKind::DataReader, EntityId::all());
    let wr = only(&backend, EntityKind::DataWriter, EntityId::all());
    let t = only(&backend, EntityKind::Topic, EntityId::all());
    let names = |kind, origin| -> Vec<String> {
        backend
            .get_entities(kind, origin)
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect()
    };

    assert_eq!(ids(&backend, EntityKind::Host, d), BTreeSet::from([host]));
    assert_eq!(names(EntityKind::Locator, rd), vec!["L1"]);
    assert_eq!(ids(&backend, EntityKind::DataWriter, rd), BTreeSet::from([wr]));
    assert_eq!(names(EntityKind::Locator, host), vec!["L1", "L2"]);
    let l2 = only(&backend, EntityKind::Locator, wr);
    assert_eq!(ids(&backend, EntityKind::Topic, l2), BTreeSet::from([t]));
    assert_eq!(names(EntityKind::User, d), vec!["user"]);
}

#[test]
fn repeated_notifications_are_idempotent() {
    let backend = MonitorBackend::with_default_config().unwrap();
    let d = backend.start_monitor(0, None).unwrap();
    let p = participant("P", "H", "X");
    let discovered = DiscoveryNotification::participant(d, DiscoveryStatus::Discovered, p.clone());
    let removed = DiscoveryNotification::participant(d, DiscoveryStatus::Removed, p);

    assert_eq!(backend.apply(&discovered).unwrap().len(), 1);
    assert!(backend.apply(&discovered).unwrap().is_empty());
    assert_eq!(backend.discovery_count().unwrap(), 1);

    assert_eq!(backend.apply(&removed).unwrap().len(), 1);
    assert!(backend.apply(&removed).unwrap().is_empty());
    assert_eq!(backend.discovery_count().unwrap(), 0);

    let participant = only(&backend, EntityKind::Participant, d);
    assert!(!backend.is_active(participant).unwrap());
    assert_eq!(backend.apply(&discovered).unwrap().len(), 1);
    assert!(backend.is_active(participant).unwrap());
    assert!(backend.is_active(only(&backend, EntityKind::Host, d)).unwrap());
}

#[test]
fn stopped_domain_stays_inactive() {
    let backend = MonitorBackend::with_default_config().unwrap();
    let d = backend.start_monitor(0, None).unwrap();
    let p = participant("P", "H", "X");
    backend
        .apply(&DiscoveryNotification::participant(d, DiscoveryStatus::Discovered, p.clone()))
        .unwrap();
    backend.stop_monitor(d).unwrap();
    backend.stop_monitor(d).unwrap();

    backend
        .apply(&DiscoveryNotification::participant(d, DiscoveryStatus::Discovered, p))
        .unwrap();
    assert!(!backend.is_active(d).unwrap());
    assert!(backend.is_active(only(&backend, EntityKind::Participant, d)).unwrap());
}

#[test]
fn host_shared_by_two_domains() {
    let backend = MonitorBackend::with_default_config().unwrap();
    let d0 = backend.start_monitor(0, None).unwrap();
    let d1 = backend.start_monitor(1, None).unwrap();
    let p0 = participant("P0", "H", "X0");
    let p1 = participant("P1", "H", "X1");
    backend
        .apply(&DiscoveryNotification::writer(d0, DiscoveryStatus::Discovered, endpoint("W0", &p0, "T", &["L"])))
        .unwrap();
    backend
        .apply(&DiscoveryNotification::reader(d1, DiscoveryStatus::Discovered, endpoint("R1", &p1, "T", &["L"])))
        .unwrap();

    let host = only(&backend, EntityKind::Host, EntityId::all());
    assert_eq!(ids(&backend, EntityKind::Domain, host), BTreeSet::from([d0, d1]));
    // Same name, different domains: two topics. One locator shared by both.
    assert_eq!(ids(&backend, EntityKind::Topic, EntityId::all()).len(), 2);
    let locator = only(&backend, EntityKind::Locator, EntityId::all());
    assert_eq!(ids(&backend, EntityKind::Domain, locator), BTreeSet::from([d0, d1]));

    backend.stop_monitor(d0).unwrap();
    assert!(backend.is_active(host).unwrap());
    assert!(backend.is_active(only(&backend, EntityKind::Process, d1)).unwrap());
    assert!(!backend.is_active(only(&backend, EntityKind::Process, d0)).unwrap());

    backend.clear_monitor(d0).unwrap();
    assert_eq!(ids(&backend, EntityKind::Domain, host), BTreeSet::from([d1]));
    assert_eq!(ids(&backend, EntityKind::Process, EntityId::all()).len(), 1);
    assert!(backend.get_entity(locator).is_ok());
    assert_eq!(ids(&backend, EntityKind::Participant, EntityId::all()).len(), 1);
}

#[test]
fn unknown_origin_is_bad_parameter_for_every_kind() {
    let backend = MonitorBackend::with_default_config().unwrap();
    let d = backend.start_monitor(0, None).unwrap();
    let unknown = EntityId::from(d.value() + 100);
    for kind in EntityKind::VALID.into_iter().chain([EntityKind::Invalid]) {
        assert!(backend.get_entities(kind, unknown).unwrap_err().is_bad_parameter());
        assert!(backend.get_entity_ids(kind, EntityId::invalid()).unwrap_err().is_bad_parameter());
    }
    assert!(backend.get_entities(EntityKind::Invalid, d).unwrap_err().is_bad_parameter());
    assert!(backend.is_active(unknown).unwrap_err().is_not_found());
}

#[test]
fn listener_receives_counted_changes() {
    let backend = MonitorBackend::with_default_config().unwrap();
    let events = Arc::new(Mutex::new(Vec::<DiscoveryEvent>::new()));
    let sink = Arc::clone(&events);
    let listener: Arc<dyn DiscoveryListener> = Arc::new(move |e: &DiscoveryEvent| sink.lock().unwrap().push(*e));
    let d = backend.start_monitor(9, Some(listener)).unwrap();

    let p = participant("P", "H", "X");
    let info = endpoint("W", &p, "T", &["L"]);
    backend
        .submit(DiscoveryNotification::writer(d, DiscoveryStatus::Discovered, info.clone()))
        .unwrap();
    backend
        .submit(DiscoveryNotification::writer(d, DiscoveryStatus::Removed, info))
        .unwrap();
    backend.flush().unwrap();

    let events = events.lock().unwrap();
    let kinds: Vec<(EntityKind, i64)> = events.iter().map(|e| (e.kind, e.count_delta)).collect();
    assert_eq!(
        kinds,
        vec![
            (EntityKind::Participant, 1),
            (EntityKind::Topic, 1),
            (EntityKind::DataWriter, 1),
            (EntityKind::DataWriter, -1),
            (EntityKind::Topic, -1),
        ]
    );
    assert!(events.iter().all(|e| e.domain == d));
    assert_eq!(backend.discovery_count().unwrap(), 1);
}

#[test]
fn waits_can_be_cancelled_or_time_out() {
    let backend = Arc::new(MonitorBackend::with_default_config().unwrap());
    let token = CancellationToken::new();

    let waiter = {
        let backend = Arc::clone(&backend);
        let token = token.clone();
        thread::spawn(move || backend.wait_for_count(|c| c >= 1_000, &token, None))
    };
    thread::sleep(Duration::from_millis(20));
    token.cancel();
    assert!(matches!(
        waiter.join().unwrap(),
        Err(GraphError::Execution(ExecutionError::Cancelled))
    ));

    let err = backend
        .wait_for_count(|c| c >= 1, &CancellationToken::new(), Some(Duration::from_millis(15)))
        .unwrap_err();
    assert!(matches!(err, GraphError::Execution(ExecutionError::Timeout { .. })));
}

#[test]
fn readers_never_see_half_applied_notifications() {
    let backend = Arc::new(MonitorBackend::with_default_config().unwrap());
    let d = backend.start_monitor(0, None).unwrap();
    let done = Arc::new(AtomicBool::new(false));

    let readers: Vec<_> = (0..3)
        .map(|_| {
            let backend = Arc::clone(&backend);
            let done = Arc::clone(&done);
            thread::spawn(move || {
                while !done.load(Ordering::Acquire) {
                    let graph = backend.snapshot().unwrap();
                    let q = ddsgraph::QueryEngine::new(&graph);
                    for w in q.get_entities(EntityKind::DataWriter, EntityId::all()).unwrap() {
                        assert_eq!(q.get_entities(EntityKind::Participant, w).unwrap().len(), 1);
                        assert_eq!(q.get_entities(EntityKind::Topic, w).unwrap().len(), 1);
                        assert_eq!(q.get_entities(EntityKind::Host, w).unwrap().len(), 1);
                        assert_eq!(q.get_entities(EntityKind::Locator, w).unwrap().len(), 2);
                    }
                }
            })
        })
        .collect();

    for i in 0..100 {
        let p = participant(&format!("P{i}"), &format!("H{}", i % 4), "X");
        let addr_a = format!("udp:{i}");
        let addr_b = format!("udp:{}", i + 1000);
        backend
            .submit(DiscoveryNotification::writer(
                d,
                DiscoveryStatus::Discovered,
                endpoint(&format!("W{i}"), &p, &format!("T{}", i % 7), &[&addr_a, &addr_b]),
            ))
            .unwrap();
    }
    backend.flush().unwrap();
    done.store(true, Ordering::Release);
    for r in readers {
        r.join().unwrap();
    }
    assert_eq!(ids(&backend, EntityKind::DataWriter, d).len(), 100);
    assert_eq!(ids(&backend, EntityKind::Host, d).len(), 4);
    assert_eq!(backend.rejected_notifications(), 0);
}

#[test]
fn count_follows_graph_order_under_concurrent_applies() {
    let backend = Arc::new(MonitorBackend::with_default_config().unwrap());
    let d = backend.start_monitor(0, None).unwrap();
    let p = participant("P", "H", "X");
    let token = CancellationToken::new();

    let watcher = {
        let backend = Arc::clone(&backend);
        let token = token.clone();
        thread::spawn(move || backend.wait_for_count(|c| !(0..=1).contains(&c), &token, None))
    };

    let writers: Vec<_> = (0..2)
        .map(|_| {
            let backend = Arc::clone(&backend);
            let p = p.clone();
            thread::spawn(move || {
                let appeared = DiscoveryNotification::participant(d, DiscoveryStatus::Discovered, p.clone());
                let removed = DiscoveryNotification::participant(d, DiscoveryStatus::Removed, p);
                for _ in 0..20_000 {
                    backend.apply(&appeared).unwrap();
                    backend.apply(&removed).unwrap();
                }
            })
        })
        .collect();
    for w in writers {
        w.join().unwrap();
    }

    token.cancel();
    assert!(matches!(
        watcher.join().unwrap(),
        Err(GraphError::Execution(ExecutionError::Cancelled))
    ));
    assert_eq!(backend.discovery_count().unwrap(), 0);
    assert!(!backend.is_active(only(&backend, EntityKind::Participant, d)).unwrap());
}
