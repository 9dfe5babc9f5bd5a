// Copyright 2025 AgentReplay (https://github.com/agentreplay)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Integration tests for the indexing tree over persisted segments

use apmindex_core::{logging, ApmIndexConfig, MonitoringRecord, RecordKind, StorageSettings};
use apmindex_storage::{IndexingTree, QueryDescriptor, Restriction, TimeWindow};
use chrono::{DateTime, TimeZone, Utc};
use std::sync::Arc;
use std::thread;

fn ts(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).unwrap()
}

fn segment_settings(dir: &std::path::Path) -> StorageSettings {
    StorageSettings {
        segment_dir: Some(dir.to_path_buf()),
        sync_writes: false,
    }
}

fn agent_query(agent_id: u64) -> QueryDescriptor {
    QueryDescriptor::builder()
        .kind(RecordKind::JmxSensorValue)
        .agent(agent_id)
        .build()
        .unwrap()
}

/// Records survive a restart and are loaded lazily on first access
#[test]
fn test_segments_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();

    {
        let tree = IndexingTree::from_settings(&segment_settings(dir.path())).unwrap();
        for secs in [30, 10, 20] {
            tree.insert(MonitoringRecord::jmx(7, 3, 42, ts(secs), "v"))
                .unwrap();
        }
        tree.insert(MonitoringRecord::jmx(8, 3, 42, ts(5), "v")).unwrap();
    }

    let tree = IndexingTree::from_settings(&segment_settings(dir.path())).unwrap();
    assert!(tree.is_empty());

    let results = tree.query(&agent_query(7)).unwrap();
    let times: Vec<i64> = results.iter().map(|r| r.timestamp.timestamp()).collect();
    assert_eq!(times, vec![10, 20, 30]);
    assert_eq!(tree.agents(), vec![7]);

    let all = QueryDescriptor::builder()
        .kind(RecordKind::JmxSensorValue)
        .build()
        .unwrap();
    assert_eq!(tree.query(&all).unwrap().len(), 4);
}

/// Deleting one agent leaves the other fully queryable, also after a restart
#[test]
fn test_delete_agent_persists() {
    let dir = tempfile::tempdir().unwrap();
    let tree = IndexingTree::from_settings(&segment_settings(dir.path())).unwrap();

    for secs in 0..5 {
        tree.insert(MonitoringRecord::jmx(1, 3, 42, ts(secs), "a")).unwrap();
        tree.insert(MonitoringRecord::jmx(2, 3, 42, ts(secs), "b")).unwrap();
    }

    tree.delete(1).unwrap();

    assert!(tree.query(&agent_query(1)).unwrap().is_empty());
    assert_eq!(tree.query(&agent_query(2)).unwrap().len(), 5);

    let reopened = IndexingTree::from_settings(&segment_settings(dir.path())).unwrap();
    let all = QueryDescriptor::builder()
        .kind(RecordKind::JmxSensorValue)
        .build()
        .unwrap();
    let results = reopened.query(&all).unwrap();
    assert_eq!(results.len(), 5);
    assert!(results.iter().all(|r| r.agent_id == 2));
}

/// Queries on one agent run while another agent is being written
#[test]
fn test_query_while_inserting_other_agent() {
    let tree = Arc::new(IndexingTree::new());
    for secs in 0..100 {
        tree.insert(MonitoringRecord::jmx(1, 3, 42, ts(secs), "a")).unwrap();
    }

    let writer = {
        let tree = Arc::clone(&tree);
        thread::spawn(move || {
            for secs in 0..2_000 {
                tree.insert(MonitoringRecord::jmx(2, 3, 42, ts(secs), "b"))
                    .unwrap();
            }
        })
    };

    let query = QueryDescriptor::builder()
        .kind(RecordKind::JmxSensorValue)
        .agent(1)
        .window(TimeWindow::new(ts(10), ts(60)))
        .restrict(Restriction::equals("value", "a"))
        .build()
        .unwrap();
    for _ in 0..200 {
        assert_eq!(tree.query(&query).unwrap().len(), 50);
    }

    writer.join().unwrap();
    assert_eq!(tree.query(&agent_query(2)).unwrap().len(), 2_000);
}

/// A config file pointing at a segment directory yields a persistent tree
#[test]
fn test_tree_from_config_file() {
    logging::init_for_tests();
    let dir = tempfile::tempdir().unwrap();
    let segments = dir.path().join("segments");
    let config_path = dir.path().join("apmindex.toml");
    std::fs::write(
        &config_path,
        format!(
            "[storage]\nsegment_dir = {:?}\nsync_writes = true\n",
            segments.display().to_string()
        ),
    )
    .unwrap();

    let config = ApmIndexConfig::from_file(&config_path).unwrap();
    assert!(config.storage.sync_writes);
    assert!(config.cache.refresh_on_miss);

    let tree = IndexingTree::from_settings(&config.storage).unwrap();
    tree.insert(MonitoringRecord::jmx(3, 3, 9, ts(1), "up")).unwrap();
    assert!(segments.is_dir());

    let reopened = IndexingTree::from_settings(&config.storage).unwrap();
    assert_eq!(reopened.query(&agent_query(3)).unwrap().len(), 1);
}

/// A torn tail left by a crash does not poison later appends or full scans
#[test]
fn test_torn_segment_recovers_for_all_agent_scans() {
    use std::io::Write;

    let dir = tempfile::tempdir().unwrap();
    {
        let tree = IndexingTree::from_settings(&segment_settings(dir.path())).unwrap();
        tree.insert(MonitoringRecord::jmx(4, 3, 42, ts(1), "a")).unwrap();
        tree.insert(MonitoringRecord::jmx(5, 3, 42, ts(1), "b")).unwrap();
    }

    let mut segment = std::fs::OpenOptions::new()
        .append(true)
        .open(dir.path().join(format!("agent-{:020}.seg", 4)))
        .unwrap();
    segment.write_all(&64u32.to_le_bytes()).unwrap();
    segment.write_all(&[1, 2, 3]).unwrap();
    drop(segment);

    {
        let tree = IndexingTree::from_settings(&segment_settings(dir.path())).unwrap();
        for secs in 2..=21 {
            tree.insert(MonitoringRecord::jmx(4, 3, 42, ts(secs), "c"))
                .unwrap();
        }
        assert_eq!(tree.query(&agent_query(4)).unwrap().len(), 21);
    }

    let tree = IndexingTree::from_settings(&segment_settings(dir.path())).unwrap();
    let all = QueryDescriptor::builder()
        .kind(RecordKind::JmxSensorValue)
        .build()
        .unwrap();
    assert_eq!(tree.query(&all).unwrap().len(), 22);
}
