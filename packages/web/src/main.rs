// Dioxus `rsx!` macro expands to unwraps internally; allow to avoid false positives.
#![allow(clippy::disallowed_methods)]

use api::{DemoJobRequest, TriggerDemoJobResponse};
use dioxus::prelude::*;

fn main() {
    #[cfg(feature = "server")]
    {
        use tracing_subscriber::EnvFilter;

        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
            )
            .init();
        tracing::info!("Starting job dispatch server");
    }

    dioxus::launch(App);
}

#[component]
fn App() -> Element {
    rsx! {
        document::Title { "Job Dispatch" }
        TriggerDemoJob {}
    }
}

/// Outcome of the last trigger.
#[derive(Clone, PartialEq)]
enum Outcome {
    Triggered(TriggerDemoJobResponse),
    Failed(String),
}

/// Form posting a JSON body to `/api/v1/demo`.
#[component]
fn TriggerDemoJob() -> Element {
    let mut payload = use_signal(|| r#"{"foo": "bar"}"#.to_string());
    let mut outcome = use_signal(|| None::<Outcome>);
    let mut submitting = use_signal(|| false);

    let submit = move |_| {
        let payload_val = payload();

        spawn(async move {
            submitting.set(true);

            let request: DemoJobRequest = match serde_json::from_str(&payload_val) {
                Ok(request) => request,
                Err(e) => {
                    outcome.set(Some(Outcome::Failed(format!("Invalid JSON object: {}", e))));
                    submitting.set(false);
                    return;
                }
            };

            let result = match api::trigger_demo_job(request).await {
                Ok(response) => match response.data {
                    Some(data) if response.success => Outcome::Triggered(data),
                    _ => Outcome::Failed(format!(
                        "{}: {}",
                        response.http_status(),
                        response.message.unwrap_or_default()
                    )),
                },
                Err(e) => Outcome::Failed(format!("Request failed: {}", e)),
            };
            outcome.set(Some(result));

            submitting.set(false);
        });
    };

    rsx! {
        main { class: "trigger-job",
            h1 { "Background job demo" }

            div { class: "form-group",
                label { "Request (JSON)" }
                textarea {
                    rows: 6,
                    value: "{payload}",
                    oninput: move |e| payload.set(e.value()),
                }
            }

            button {
                class: "btn btn-primary",
                disabled: submitting(),
                onclick: submit,
                if submitting() { "Triggering..." } else { "Trigger job" }
            }

            match outcome() {
                Some(Outcome::Triggered(response)) => rsx! {
                    div { class: "success-message",
                        p { "{response.message}" }
                        p { "Job id: " code { "{response.job_id}" } }
                    }
                },
                Some(Outcome::Failed(message)) => rsx! {
                    div { class: "error-message", "{message}" }
                },
                None => rsx! {},
            }
        }
    }
}
