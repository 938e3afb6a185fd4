#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use std::sync::Arc;

    use chrono::Utc;
    use sqlx::any::{install_default_drivers, AnyPoolOptions};
    use uuid::Uuid;

    use workqueue::adapters::{
        FileBlock, InMemorySpecStore, MockDbsAdapter, MockPhedexAdapter, MockRequestManagerAdapter,
        MockSiteDbAdapter, MockSubstrateAdapter,
    };
    use workqueue::config::QueueTunables;
    use workqueue::engine::Engine;
    use workqueue::model::{EndPolicyName, InboxElement, Spec, SpecTask, StartPolicyName, Status};
    use workqueue::repo::{ElementFilter, SqlxElementRepo, SqlxInboxRepo, SqlxJournalRepo};

    /// One fresh on-disk SQLite database per test, removed on drop so
    /// tests don't leak state into each other or the working directory.
    struct TestDb {
        path: std::path::PathBuf,
    }

    impl TestDb {
        async fn connect() -> (Self, sqlx::any::AnyPool) {
            install_default_drivers();
            let path = std::env::temp_dir().join(format!("workqueue-it-{}.sqlite", Uuid::new_v4()));
            let url = format!("sqlite://{}?mode=rwc", path.display());
            let pool = AnyPoolOptions::new()
                .max_connections(1)
                .connect(&url)
                .await
                .expect("connect test sqlite db");
            sqlx::migrate!("./migrations")
                .run(&pool)
                .await
                .expect("run migrations");
            (Self { path }, pool)
        }
    }

    impl Drop for TestDb {
        fn drop(&mut self) {
            let _ = std::fs::remove_file(&self.path);
        }
    }

    async fn test_engine() -> (TestDb, sqlx::any::AnyPool, Engine) {
        let (db, pool) = TestDb::connect().await;
        let elements = Arc::new(SqlxElementRepo::new(pool.clone()));
        let inbox = Arc::new(SqlxInboxRepo::new(pool.clone()));
        let journal = Arc::new(SqlxJournalRepo::new(pool.clone()));

        let engine = Engine::new(
            elements,
            inbox,
            journal,
            Arc::new(MockDbsAdapter::new()),
            Arc::new(MockPhedexAdapter::new()),
            Arc::new(MockSiteDbAdapter::new()),
            Arc::new(MockSubstrateAdapter::new()),
            Arc::new(MockRequestManagerAdapter::new()),
            Arc::new(InMemorySpecStore::new()),
            None,
            QueueTunables::default(),
        );

        (db, pool, engine)
    }

    fn element(request_name: &str, status: Status, child_queue_url: Option<&str>) -> workqueue::model::Element {
        let now = Utc::now();
        workqueue::model::Element {
            id: Uuid::new_v4().to_string(),
            request_name: request_name.to_string(),
            task_name: "Task1".to_string(),
            status,
            priority: 10,
            inputs: Default::default(),
            mask: None,
            jobs: 4,
            number_of_events: 0,
            number_of_lumis: 0,
            number_of_files: 0,
            percent_complete: 0.0,
            percent_success: 0.0,
            parent_queue_id: None,
            parent_queue_url: None,
            child_queue_url: child_queue_url.map(|s| s.to_string()),
            wmbs_url: None,
            subscription_id: Some(42),
            start_policy: StartPolicyName::Block,
            end_policy: EndPolicyName::SingleShot,
            team_name: None,
            open_for_new_data: false,
            timestamp_found_new_data: None,
            num_of_files_added: 0,
            possible_site: BTreeSet::new(),
            location_refresh_time: None,
            update_time: now,
            insert_time: now,
            version: 0,
        }
    }

    // S3: cancellation fast-path — no child goes straight to `Canceled`;
    // a child queue link leaves it at `CancelRequested` instead, with the
    // inbox following the same split.
    #[tokio::test]
    async fn cancel_work_fast_path_depends_on_child_queue_url() {
        let (_db, _pool, engine) = test_engine().await;

        let available = element("wf-no-child", Status::Available, None);
        let running = element("wf-with-child", Status::Running, Some("http://child.example/"));
        engine.elements.insert(&[available.clone(), running.clone()]).await.unwrap();

        let now = Utc::now();
        let mut inbox_no_child = InboxElement::new("wf-no-child", "spec://wf-no-child", now);
        inbox_no_child.status = Status::Running;
        let mut inbox_with_child = InboxElement::new("wf-with-child", "spec://wf-with-child", now);
        inbox_with_child.status = Status::Running;
        engine.inbox.insert(&inbox_no_child).await.unwrap();
        engine.inbox.insert(&inbox_with_child).await.unwrap();

        engine
            .cancel_work(&["wf-no-child".to_string(), "wf-with-child".to_string()], false)
            .await
            .unwrap();

        let no_child_elements = engine
            .elements
            .get(&ElementFilter::by_request("wf-no-child"))
            .await
            .unwrap();
        assert_eq!(no_child_elements[0].status, Status::Canceled);

        let with_child_elements = engine
            .elements
            .get(&ElementFilter::by_request("wf-with-child"))
            .await
            .unwrap();
        assert_eq!(with_child_elements[0].status, Status::CancelRequested);

        let no_child_inbox = engine.inbox.get("wf-no-child").await.unwrap().unwrap();
        assert_eq!(no_child_inbox.status, Status::Canceled);

        let with_child_inbox = engine.inbox.get("wf-with-child").await.unwrap().unwrap();
        assert_eq!(with_child_inbox.status, Status::CancelRequested);
    }

    // S4: continuous close — an inbox whose last activity predates
    // `OpenRunningTimeout` by less than the timeout stays open; once it's
    // past the timeout, `closeWork` flips `OpenForNewData` off.
    #[tokio::test]
    async fn close_work_respects_open_running_timeout() {
        let (_db, _pool, engine) = test_engine().await;

        let spec = Spec {
            name: "wf".to_string(),
            request_type: "TaskChain".to_string(),
            tasks: vec![SpecTask {
                name: "Task1".to_string(),
                start_policy: StartPolicyName::Block,
                input_dataset: Some("/a/b/c".to_string()),
                parent_processing_flag: false,
                request_num_events: None,
                events_per_job: None,
                filter_efficiency: None,
                first_event: None,
                first_lumi: None,
                files_per_job: None,
                acdc_total_files: None,
                open_running_timeout: Some(3600),
            }],
        };
        let spec_store = InMemorySpecStore::new().with_spec("spec://wf", spec);

        let tunables = QueueTunables::default();
        let engine = Engine::new(
            engine.elements.clone(),
            engine.inbox.clone(),
            engine.journal.clone(),
            engine.dbs.clone(),
            engine.phedex.clone(),
            engine.sitedb.clone(),
            engine.substrate.clone(),
            engine.request_manager.clone(),
            Arc::new(spec_store),
            None,
            tunables,
        );

        let now = Utc::now();
        let mut inbox = InboxElement::new("wf", "spec://wf", now);
        inbox.status = Status::Running;
        inbox.open_for_new_data = true;
        inbox.timestamp_found_new_data = Some(now - chrono::Duration::seconds(3599));
        engine.inbox.insert(&inbox).await.unwrap();

        let closed = engine.close_work(None).await.unwrap();
        assert_eq!(closed, 0, "must stay open before the timeout elapses");
        let still_open = engine.inbox.get("wf").await.unwrap().unwrap();
        assert!(still_open.open_for_new_data);

        let mut inbox = still_open;
        inbox.timestamp_found_new_data = Some(now - chrono::Duration::seconds(3601));
        engine.inbox.save(&inbox).await.unwrap();

        let closed = engine.close_work(None).await.unwrap();
        assert_eq!(closed, 1, "must close once the timeout has elapsed");
        let closed_inbox = engine.inbox.get("wf").await.unwrap().unwrap();
        assert!(!closed_inbox.open_for_new_data);
    }

    // S6: reset — a running element with a subscription and a child link
    // goes back to `Available` with both cleared, its subscription id
    // retained only in the audit journal.
    #[tokio::test]
    async fn reset_work_clears_topology_and_audits_subscription() {
        let (_db, pool, engine) = test_engine().await;

        let mut running = element("wf-reset", Status::Running, Some("http://child.example/"));
        running.subscription_id = Some(42);
        engine.elements.insert(&[running.clone()]).await.unwrap();

        engine.reset_work(&[running.id.clone()]).await.unwrap();

        let after = engine
            .elements
            .get(&ElementFilter {
                element_ids: Some(vec![running.id.clone()]),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(after.len(), 1);
        let reset = &after[0];
        assert_eq!(reset.status, Status::Available);
        assert_eq!(reset.child_queue_url, None);
        assert_eq!(reset.wmbs_url, None);
        assert_eq!(reset.subscription_id, None);

        let journal_messages: Vec<(String,)> =
            sqlx::query_as("SELECT message FROM task_activity WHERE name = 'resetWork'")
                .fetch_all(&pool)
                .await
                .unwrap();
        assert!(
            journal_messages.iter().any(|(message,)| message.contains("42")),
            "subscription id must survive in the audit journal"
        );
    }

    // Invariant 6: a second close_work pass with no new inputs and no
    // elapsed timeout produces no new elements and leaves the continuous-
    // split ledger unchanged.
    #[tokio::test]
    async fn continuous_split_is_idempotent_with_no_new_data() {
        let (_db, _pool, engine) = test_engine().await;

        let spec = Spec {
            name: "wf".to_string(),
            request_type: "TaskChain".to_string(),
            tasks: vec![SpecTask {
                name: "Task1".to_string(),
                start_policy: StartPolicyName::Block,
                input_dataset: Some("/a/b/c".to_string()),
                parent_processing_flag: false,
                request_num_events: None,
                events_per_job: None,
                filter_efficiency: None,
                first_event: None,
                first_lumi: None,
                files_per_job: None,
                acdc_total_files: None,
                open_running_timeout: Some(3600),
            }],
        };
        let spec_store = InMemorySpecStore::new().with_spec("spec://wf", spec);

        let engine = Engine::new(
            engine.elements.clone(),
            engine.inbox.clone(),
            engine.journal.clone(),
            engine.dbs.clone(),
            engine.phedex.clone(),
            engine.sitedb.clone(),
            engine.substrate.clone(),
            engine.request_manager.clone(),
            Arc::new(spec_store),
            None,
            QueueTunables::default(),
        );

        let now = Utc::now();
        let mut inbox = InboxElement::new("wf", "spec://wf", now);
        inbox.status = Status::Running;
        inbox.open_for_new_data = true;
        engine.inbox.insert(&inbox).await.unwrap();

        engine.close_work(None).await.unwrap();
        let after_first = engine.inbox.get("wf").await.unwrap().unwrap();
        let elements_after_first = engine
            .elements
            .get(&ElementFilter::by_request("wf"))
            .await
            .unwrap();

        engine.close_work(None).await.unwrap();
        let after_second = engine.inbox.get("wf").await.unwrap().unwrap();
        let elements_after_second = engine
            .elements
            .get(&ElementFilter::by_request("wf"))
            .await
            .unwrap();

        assert_eq!(elements_after_first.len(), elements_after_second.len());
        assert_eq!(after_first.processed_inputs, after_second.processed_inputs);
    }

    // Invariant 6, via the real entry point: `queueWork` must record the
    // blocks it just split into `ProcessedInputs`, so the first `closeWork`
    // cycle afterward doesn't see them as new data and re-split them.
    #[tokio::test]
    async fn queue_work_then_close_work_does_not_resplit_queued_blocks() {
        let (_db, _pool, engine) = test_engine().await;

        let spec = Spec {
            name: "wf-queue-close".to_string(),
            request_type: "TaskChain".to_string(),
            tasks: vec![SpecTask {
                name: "Task1".to_string(),
                start_policy: StartPolicyName::Block,
                input_dataset: Some("/a/b/c".to_string()),
                parent_processing_flag: false,
                request_num_events: None,
                events_per_job: None,
                filter_efficiency: None,
                first_event: None,
                first_lumi: None,
                files_per_job: None,
                acdc_total_files: None,
                open_running_timeout: Some(3600),
            }],
        };
        let spec_store = InMemorySpecStore::new().with_spec("spec://wf-queue-close", spec);
        let dbs = MockDbsAdapter::new().with_dataset(
            "/a/b/c",
            vec![FileBlock {
                name: "/a/b/c#block1".to_string(),
                files: 10,
                is_open: false,
                ..Default::default()
            }],
        );

        let engine = Engine::new(
            engine.elements.clone(),
            engine.inbox.clone(),
            engine.journal.clone(),
            Arc::new(dbs),
            engine.phedex.clone(),
            engine.sitedb.clone(),
            engine.substrate.clone(),
            engine.request_manager.clone(),
            Arc::new(spec_store),
            None,
            QueueTunables::default(),
        );

        engine
            .queue_work("spec://wf-queue-close", "wf-queue-close", None, false)
            .await
            .unwrap();

        let elements_after_queue = engine
            .elements
            .get(&ElementFilter::by_request("wf-queue-close"))
            .await
            .unwrap();
        assert_eq!(elements_after_queue.len(), 1, "one element for the one closed block");

        let inbox_after_queue = engine.inbox.get("wf-queue-close").await.unwrap().unwrap();
        assert!(
            inbox_after_queue.processed_inputs.contains("/a/b/c#block1"),
            "queueWork must record the block it just split into the continuous-split ledger"
        );

        engine.close_work(None).await.unwrap();

        let elements_after_close = engine
            .elements
            .get(&ElementFilter::by_request("wf-queue-close"))
            .await
            .unwrap();
        assert_eq!(
            elements_after_close.len(),
            elements_after_queue.len(),
            "closeWork must not re-split a block queueWork already processed"
        );
    }
}
