mod common;

use std::sync::Arc;
use std::time::Duration;

use broker::{Broker, BrokerConfig};
use demo::{
    DEMO_JOB_QUEUE, DemoJobProcessor, DemoJobRequest, TriggerDemoJobCommand,
    TriggerDemoJobHandler, register_demo_worker,
};
use dispatch_core::{JobEvent, QueueConfig, StatusCode};

use common::run;

#[test]
fn triggered_demo_job_is_processed() {
    run(async {
        let broker = Broker::start(BrokerConfig::default()).await.unwrap();
        let worker = register_demo_worker(
            &broker,
            DemoJobProcessor::new(Duration::from_millis(50)),
            QueueConfig::default().with_poll_interval(10),
        )
        .await
        .unwrap();
        assert_eq!(worker.queue_name(), DEMO_JOB_QUEUE);
        let mut events = worker.subscribe();

        let handler = TriggerDemoJobHandler::new(Arc::new(broker.clone()));
        let response = handler
            .handle(Some(TriggerDemoJobCommand::new(
                DemoJobRequest::new().with("foo", "bar"),
            )))
            .await;
        assert_eq!(response.status_code, StatusCode::Ok);
        let job_id = response.data.unwrap().job_id;

        let completed = tokio::time::timeout(Duration::from_secs(10), async {
            loop {
                match events.recv().await {
                    Some(event @ JobEvent::JobCompleted { .. }) => return event,
                    Some(_) => continue,
                    None => panic!("event channel closed"),
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(completed.job_id(), Some(job_id));

        worker.close().await;
        broker.shutdown().await;
    });
}
