//! Job store tables, defined in SurrealQL.

use crate::{DbError, get_db};

/// Define the job tables and their indexes if they are missing.
pub async fn init_schema() -> Result<(), DbError> {
    get_db()?
        .query(JOB_SCHEMA)
        .query(JOB_HISTORY_SCHEMA)
        .query(DEAD_LETTER_SCHEMA)
        .await?
        .check()?;

    tracing::debug!("Job tables ready: {}", TABLES.join(", "));
    Ok(())
}

/// Every table the repositories write to.
pub const TABLES: [&str; 3] = ["job", "job_history", "dead_letter"];

/// Jobs that have not reached a terminal state.
const JOB_SCHEMA: &str = r#"
DEFINE TABLE IF NOT EXISTS job SCHEMALESS;

DEFINE INDEX IF NOT EXISTS job_queue ON job FIELDS job.queue_name;
DEFINE INDEX IF NOT EXISTS job_state ON job FIELDS job.status.state;
DEFINE INDEX IF NOT EXISTS job_queue_state ON job FIELDS job.queue_name, job.status.state;
"#;

/// Completed and failed jobs (archival).
const JOB_HISTORY_SCHEMA: &str = r#"
DEFINE TABLE IF NOT EXISTS job_history SCHEMALESS;

DEFINE INDEX IF NOT EXISTS history_job ON job_history FIELDS job_id;
DEFINE INDEX IF NOT EXISTS history_queue ON job_history FIELDS queue_name;
DEFINE INDEX IF NOT EXISTS history_status ON job_history FIELDS final_status;
"#;

/// Jobs that exhausted their attempts or could not be decoded.
const DEAD_LETTER_SCHEMA: &str = r#"
DEFINE TABLE IF NOT EXISTS dead_letter SCHEMALESS;

DEFINE INDEX IF NOT EXISTS dead_letter_queue ON dead_letter FIELDS queue_name;
DEFINE INDEX IF NOT EXISTS dead_letter_job ON dead_letter FIELDS job_id UNIQUE;
"#;
