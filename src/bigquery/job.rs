use super::query::QueryConfig;
use super::rows::RowIterator;
use super::transfer::{CopyConfig, ExtractConfig, LoadConfig};
use super::wire::{millis_to_time, opt_i64, JobReference};
use super::{Connection, PageInfo};
use crate::utils::error::{Error, Result};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as Json};
use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

static JOB_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// How the ID of a new job is chosen.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobIdConfig {
    /// Left empty, a unique ID is generated.
    pub job_id: String,
    /// Append a unique suffix to `job_id`.
    pub add_job_id_suffix: bool,
    /// Overrides the client's location for this job.
    pub location: String,
    /// Project to run the job in; the client's project when empty.
    pub project_id: String,
}

impl JobIdConfig {
    pub(crate) fn create_job_id(&self) -> String {
        let unique = format!(
            "{:x}{:04x}",
            Utc::now().timestamp_nanos_opt().unwrap_or_default(),
            JOB_ID_COUNTER.fetch_add(1, Ordering::Relaxed) & 0xffff
        );
        match (self.job_id.is_empty(), self.add_job_id_suffix) {
            (true, _) => format!("job_{}", unique),
            (false, true) => format!("{}-{}", self.job_id, unique),
            (false, false) => self.job_id.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TableCreateDisposition {
    CreateIfNeeded,
    CreateNever,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TableWriteDisposition {
    WriteAppend,
    WriteTruncate,
    WriteEmpty,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum State {
    #[default]
    StateUnspecified,
    Pending,
    Running,
    Done,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct JobError {
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub message: String,
}

impl fmt::Display for JobError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{Location: {:?}; Message: {:?}; Reason: {:?}}}", self.location, self.message, self.reason)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobStatistics {
    pub creation_time: Option<DateTime<Utc>>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub total_bytes_processed: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobStatus {
    pub state: State,
    /// Set when the job failed as a whole.
    pub error: Option<JobError>,
    /// Every error met while running, fatal or not.
    pub errors: Vec<JobError>,
    pub statistics: Option<JobStatistics>,
}

impl JobStatus {
    pub fn done(&self) -> bool {
        self.state == State::Done
    }

    pub fn err(&self) -> Option<&JobError> {
        self.error.as_ref()
    }
}

/// The configuration a job was created with.
#[derive(Debug, Clone, PartialEq)]
pub enum JobConfig {
    Query(QueryConfig),
    Copy(CopyConfig),
    Extract(ExtractConfig),
    Load(LoadConfig),
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WireJob {
    #[serde(default)]
    job_reference: JobReference,
    #[serde(default)]
    configuration: Option<Json>,
    #[serde(default)]
    status: Option<WireJobStatus>,
    #[serde(default)]
    statistics: Option<WireStatistics>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireJobStatus {
    #[serde(default)]
    state: State,
    #[serde(default)]
    error_result: Option<JobError>,
    #[serde(default)]
    errors: Vec<JobError>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireStatistics {
    #[serde(default, with = "opt_i64")]
    creation_time: Option<i64>,
    #[serde(default, with = "opt_i64")]
    start_time: Option<i64>,
    #[serde(default, with = "opt_i64")]
    end_time: Option<i64>,
    #[serde(default, with = "opt_i64")]
    total_bytes_processed: Option<i64>,
}

fn status_from_wire(status: WireJobStatus, statistics: Option<WireStatistics>) -> JobStatus {
    JobStatus {
        state: status.state,
        error: status.error_result,
        errors: status.errors,
        statistics: statistics.map(|s| JobStatistics {
            creation_time: millis_to_time(s.creation_time),
            start_time: millis_to_time(s.start_time),
            end_time: millis_to_time(s.end_time),
            total_bytes_processed: s.total_bytes_processed.unwrap_or_default(),
        }),
    }
}

fn config_from_wire(conn: &Connection, configuration: &Json) -> Option<JobConfig> {
    if let Some(query) = configuration.get("query") {
        return Some(JobConfig::Query(QueryConfig::from_wire(conn, query, configuration)));
    }
    if let Some(copy) = configuration.get("copy") {
        return Some(JobConfig::Copy(CopyConfig::from_wire(conn, copy, configuration)));
    }
    if let Some(extract) = configuration.get("extract") {
        return Some(JobConfig::Extract(ExtractConfig::from_wire(conn, extract, configuration)));
    }
    configuration
        .get("load")
        .map(|load| JobConfig::Load(LoadConfig::from_wire(conn, load, configuration)))
}

/// A job on the service.
pub struct Job {
    conn: Connection,
    project_id: String,
    job_id: String,
    location: String,
    config: Option<JobConfig>,
    last_status: Mutex<Option<JobStatus>>,
}

impl Job {
    pub(crate) fn from_wire(conn: Connection, wire: WireJob) -> Self {
        let config = wire
            .configuration
            .as_ref()
            .and_then(|c| config_from_wire(&conn, c));
        let status = wire.status.map(|s| status_from_wire(s, wire.statistics));
        Self {
            project_id: wire.job_reference.project_id,
            job_id: wire.job_reference.job_id,
            location: wire.job_reference.location,
            config,
            last_status: Mutex::new(status),
            conn,
        }
    }

    pub(crate) async fn fetch(conn: Connection, project_id: &str, job_id: &str, location: &str) -> Result<Self> {
        let wire: WireJob = conn
            .transport
            .get(
                &format!("projects/{}/jobs/{}", project_id, job_id),
                &location_query(location),
            )
            .await?;
        Ok(Self::from_wire(conn, wire))
    }

    /// Submits a job built from `configuration`.
    pub(crate) async fn insert(conn: &Connection, id_config: &JobIdConfig, configuration: Json) -> Result<Self> {
        let project_id = if id_config.project_id.is_empty() {
            conn.project_id.clone()
        } else {
            id_config.project_id.clone()
        };
        let location = if id_config.location.is_empty() {
            conn.location()
        } else {
            id_config.location.clone()
        };
        let reference = JobReference {
            project_id: project_id.clone(),
            job_id: id_config.create_job_id(),
            location,
        };

        let wire: WireJob = conn
            .transport
            .post(
                &format!("projects/{}/jobs", project_id),
                &[],
                &json!({ "jobReference": reference, "configuration": configuration }),
            )
            .await?;
        let job = Self::from_wire(conn.clone(), wire);
        tracing::info!("Started job {}", job.job_id);
        Ok(job)
    }

    pub fn id(&self) -> &str {
        &self.job_id
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn config(&self) -> Result<JobConfig> {
        self.config
            .clone()
            .ok_or_else(|| Error::invalid_response(format!("job {} has no known configuration", self.job_id)))
    }

    /// Fetches the current status from the service.
    pub async fn status(&self) -> Result<JobStatus> {
        let wire: WireJob = self
            .conn
            .transport
            .get(&self.path(), &location_query(&self.location))
            .await?;
        let status = status_from_wire(wire.status.unwrap_or_default(), wire.statistics);
        *self.last_status.lock() = Some(status.clone());
        Ok(status)
    }

    /// The status seen by the most recent call that fetched it, without an
    /// RPC.
    pub fn last_status(&self) -> Option<JobStatus> {
        self.last_status.lock().clone()
    }

    /// Requests cancellation; the job may still complete.
    pub async fn cancel(&self) -> Result<()> {
        let _: Json = self
            .conn
            .transport
            .post(
                &format!("{}/cancel", self.path()),
                &location_query(&self.location),
                &json!({}),
            )
            .await?;
        tracing::info!("Requested cancellation of job {}", self.job_id);
        Ok(())
    }

    /// Polls until the job is done. A failed job is still returned as `Ok`;
    /// check [`JobStatus::err`].
    pub async fn wait(&self) -> Result<JobStatus> {
        let mut delay = Duration::from_millis(250);
        loop {
            let status = self.status().await?;
            if status.done() {
                return Ok(status);
            }
            tracing::debug!(job = %self.job_id, state = ?status.state, "waiting for job");
            tokio::time::sleep(delay).await;
            delay = (delay * 2).min(Duration::from_secs(8));
        }
    }

    /// Rows of a query job's results.
    pub fn read(&self) -> Result<RowIterator> {
        match &self.config {
            Some(JobConfig::Query(_)) | None => Ok(RowIterator::for_query(
                self.conn.clone(),
                &self.project_id,
                &self.job_id,
                &self.location,
            )),
            Some(_) => Err(Error::InvalidConfigValue {
                field: "job".to_string(),
                value: self.job_id.clone(),
                reason: "only query jobs have results to read".to_string(),
            }),
        }
    }

    fn path(&self) -> String {
        format!("projects/{}/jobs/{}", self.project_id, self.job_id)
    }
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("project_id", &self.project_id)
            .field("job_id", &self.job_id)
            .field("location", &self.location)
            .finish()
    }
}

fn location_query(location: &str) -> Vec<(&'static str, String)> {
    if location.is_empty() {
        Vec::new()
    } else {
        vec![("location", location.to_string())]
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobList {
    #[serde(default)]
    jobs: Vec<WireJob>,
    #[serde(default)]
    next_page_token: String,
}

/// Lists jobs, most recent first.
pub struct JobIterator {
    conn: Connection,
    /// Project whose jobs are listed; the client's project by default.
    pub project_id: String,
    /// Include jobs of every user, not just the caller's.
    pub all_users: bool,
    /// Only jobs in this state; `StateUnspecified` lists all.
    pub state: State,
    buffered: VecDeque<Job>,
    page_info: PageInfo,
    exhausted: bool,
}

impl JobIterator {
    pub(crate) fn new(conn: Connection) -> Self {
        Self {
            project_id: conn.project_id.clone(),
            conn,
            all_users: false,
            state: State::StateUnspecified,
            buffered: VecDeque::new(),
            page_info: PageInfo::default(),
            exhausted: false,
        }
    }

    pub async fn next(&mut self) -> Result<Option<Job>> {
        while self.buffered.is_empty() && !self.exhausted {
            self.fetch().await?;
        }
        let next = self.buffered.pop_front();
        self.page_info.remaining = self.buffered.len();
        Ok(next)
    }

    pub fn page_info(&self) -> &PageInfo {
        &self.page_info
    }

    pub fn page_info_mut(&mut self) -> &mut PageInfo {
        &mut self.page_info
    }

    async fn fetch(&mut self) -> Result<()> {
        let mut query = self.page_info.query();
        query.push(("projection", "full".to_string()));
        if self.all_users {
            query.push(("allUsers", "true".to_string()));
        }
        let state = match self.state {
            State::Pending => Some("pending"),
            State::Running => Some("running"),
            State::Done => Some("done"),
            State::StateUnspecified => None,
        };
        if let Some(state) = state {
            query.push(("stateFilter", state.to_string()));
        }

        let list: JobList = self
            .conn
            .transport
            .get(&format!("projects/{}/jobs", self.project_id), &query)
            .await?;
        for wire in list.jobs {
            self.buffered.push_back(Job::from_wire(self.conn.clone(), wire));
        }
        self.exhausted = list.next_page_token.is_empty();
        self.page_info.token = list.next_page_token;
        self.page_info.remaining = self.buffered.len();
        Ok(())
    }
}
