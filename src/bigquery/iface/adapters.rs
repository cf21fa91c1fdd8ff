use super::structs::unwrap_table;
use super::{
    Client, CopyConfig, Copier, Dataset, DatasetIterator, DatasetMetadata, DatasetMetadataToUpdate,
    ExtractConfig, Extractor, Job, JobIterator, LoadConfig, Loader, Query, QueryConfig,
    RowIterator, Table, TableIterator, Uploader,
};
use crate::bigquery::{
    self, GcsReference, InsertRow, JobConfig, JobIdConfig, JobStatus, LoadSource, PageInfo,
    Schema, State, TableMetadata, TableMetadataToUpdate, Value,
};
use crate::utils::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// Adapts a [`bigquery::Client`] so that it satisfies the [`Client`] trait.
pub fn adapt_client(client: bigquery::Client) -> Box<dyn Client> {
    Box::new(ClientAdapter(Arc::new(client)))
}

struct ClientAdapter(Arc<bigquery::Client>);
struct CopierAdapter(bigquery::Copier);
struct DatasetAdapter(Arc<bigquery::Dataset>);
struct DatasetIteratorAdapter(bigquery::DatasetIterator);
struct ExtractorAdapter(bigquery::Extractor);
struct LoaderAdapter(bigquery::Loader);
struct JobAdapter(Arc<bigquery::Job>);
struct JobIteratorAdapter(bigquery::JobIterator);
struct QueryAdapter(bigquery::Query);
struct RowIteratorAdapter(bigquery::RowIterator);
pub(super) struct TableAdapter(pub(super) Arc<bigquery::Table>);
struct TableIteratorAdapter(bigquery::TableIterator);
struct UploaderAdapter(bigquery::Uploader);

fn wrap_job(job: bigquery::Job) -> Box<dyn Job> {
    Box::new(JobAdapter(Arc::new(job)))
}

fn set_page_info(target: &mut PageInfo, info: PageInfo) {
    target.token = info.token;
    target.max_size = info.max_size;
}

#[async_trait]
impl Client for ClientAdapter {
    fn location(&self) -> String {
        self.0.location()
    }

    fn set_location(&self, location: &str) {
        self.0.set_location(location)
    }

    fn close(&self) -> Result<()> {
        self.0.close()
    }

    fn dataset(&self, id: &str) -> Box<dyn Dataset> {
        Box::new(DatasetAdapter(Arc::new(self.0.dataset(id))))
    }

    fn dataset_in_project(&self, project_id: &str, dataset_id: &str) -> Box<dyn Dataset> {
        Box::new(DatasetAdapter(Arc::new(
            self.0.dataset_in_project(project_id, dataset_id),
        )))
    }

    fn datasets(&self) -> Box<dyn DatasetIterator> {
        Box::new(DatasetIteratorAdapter(self.0.datasets()))
    }

    fn datasets_in_project(&self, project_id: &str) -> Box<dyn DatasetIterator> {
        Box::new(DatasetIteratorAdapter(self.0.datasets_in_project(project_id)))
    }

    fn query(&self, q: &str) -> Box<dyn Query> {
        Box::new(QueryAdapter(self.0.query(q)))
    }

    async fn job_from_id(&self, id: &str) -> Result<Box<dyn Job>> {
        Ok(wrap_job(self.0.job_from_id(id).await?))
    }

    async fn job_from_id_location(&self, id: &str, location: &str) -> Result<Box<dyn Job>> {
        Ok(wrap_job(self.0.job_from_id_location(id, location).await?))
    }

    fn jobs(&self) -> Box<dyn JobIterator> {
        Box::new(JobIteratorAdapter(self.0.jobs()))
    }
}

#[async_trait]
impl Copier for CopierAdapter {
    fn job_id_config(&self) -> JobIdConfig {
        self.0.job_id_config.clone()
    }

    fn set_job_id_config(&mut self, config: JobIdConfig) {
        self.0.job_id_config = config;
    }

    fn set_copy_config(&mut self, config: CopyConfig) -> Result<()> {
        self.0.config = config.to_concrete()?;
        Ok(())
    }

    async fn run(&self) -> Result<Box<dyn Job>> {
        Ok(wrap_job(self.0.run().await?))
    }
}

#[async_trait]
impl Dataset for DatasetAdapter {
    fn project_id(&self) -> String {
        self.0.project_id.clone()
    }

    fn dataset_id(&self) -> String {
        self.0.dataset_id.clone()
    }

    async fn create(&self, metadata: &DatasetMetadata) -> Result<()> {
        self.0.create(&metadata.to_concrete()?).await
    }

    async fn delete(&self) -> Result<()> {
        self.0.delete().await
    }

    async fn delete_with_contents(&self) -> Result<()> {
        self.0.delete_with_contents().await
    }

    async fn metadata(&self) -> Result<DatasetMetadata> {
        let md = self.0.metadata().await?;
        Ok(DatasetMetadata::from_concrete(&md))
    }

    async fn update(&self, update: DatasetMetadataToUpdate, etag: &str) -> Result<DatasetMetadata> {
        let md = self.0.update(&update.to_concrete()?, etag).await?;
        Ok(DatasetMetadata::from_concrete(&md))
    }

    fn table(&self, id: &str) -> Box<dyn Table> {
        Box::new(TableAdapter(Arc::new(self.0.table(id))))
    }

    fn tables(&self) -> Box<dyn TableIterator> {
        Box::new(TableIteratorAdapter(self.0.tables()))
    }
}

#[async_trait]
impl DatasetIterator for DatasetIteratorAdapter {
    fn set_list_hidden(&mut self, list_hidden: bool) {
        self.0.list_hidden = list_hidden;
    }

    fn set_filter(&mut self, filter: &str) {
        self.0.filter = filter.to_string();
    }

    fn set_project_id(&mut self, project_id: &str) {
        self.0.project_id = project_id.to_string();
    }

    async fn next(&mut self) -> Result<Option<Box<dyn Dataset>>> {
        Ok(self
            .0
            .next()
            .await?
            .map(|ds| Box::new(DatasetAdapter(Arc::new(ds))) as Box<dyn Dataset>))
    }

    fn page_info(&self) -> PageInfo {
        self.0.page_info().clone()
    }

    fn set_page_info(&mut self, info: PageInfo) {
        set_page_info(self.0.page_info_mut(), info)
    }
}

#[async_trait]
impl Extractor for ExtractorAdapter {
    fn job_id_config(&self) -> JobIdConfig {
        self.0.job_id_config.clone()
    }

    fn set_job_id_config(&mut self, config: JobIdConfig) {
        self.0.job_id_config = config;
    }

    fn set_extract_config(&mut self, config: ExtractConfig) -> Result<()> {
        self.0.config = config.to_concrete()?;
        Ok(())
    }

    async fn run(&self) -> Result<Box<dyn Job>> {
        Ok(wrap_job(self.0.run().await?))
    }
}

#[async_trait]
impl Loader for LoaderAdapter {
    fn job_id_config(&self) -> JobIdConfig {
        self.0.job_id_config.clone()
    }

    fn set_job_id_config(&mut self, config: JobIdConfig) {
        self.0.job_id_config = config;
    }

    fn set_load_config(&mut self, config: LoadConfig) -> Result<()> {
        self.0.config = config.to_concrete()?;
        Ok(())
    }

    async fn run(&self) -> Result<Box<dyn Job>> {
        Ok(wrap_job(self.0.run().await?))
    }
}

#[async_trait]
impl Job for JobAdapter {
    fn id(&self) -> String {
        self.0.id().to_string()
    }

    fn location(&self) -> String {
        self.0.location().to_string()
    }

    fn config(&self) -> Result<JobConfig> {
        self.0.config()
    }

    async fn status(&self) -> Result<JobStatus> {
        self.0.status().await
    }

    fn last_status(&self) -> Option<JobStatus> {
        self.0.last_status()
    }

    async fn cancel(&self) -> Result<()> {
        self.0.cancel().await
    }

    async fn wait(&self) -> Result<JobStatus> {
        self.0.wait().await
    }

    async fn read(&self) -> Result<Box<dyn RowIterator>> {
        Ok(Box::new(RowIteratorAdapter(self.0.read()?)))
    }
}

#[async_trait]
impl JobIterator for JobIteratorAdapter {
    fn set_project_id(&mut self, project_id: &str) {
        self.0.project_id = project_id.to_string();
    }

    fn set_all_users(&mut self, all_users: bool) {
        self.0.all_users = all_users;
    }

    fn set_state(&mut self, state: State) {
        self.0.state = state;
    }

    async fn next(&mut self) -> Result<Option<Box<dyn Job>>> {
        Ok(self.0.next().await?.map(wrap_job))
    }

    fn page_info(&self) -> PageInfo {
        self.0.page_info().clone()
    }

    fn set_page_info(&mut self, info: PageInfo) {
        set_page_info(self.0.page_info_mut(), info)
    }
}

#[async_trait]
impl Query for QueryAdapter {
    fn job_id_config(&self) -> JobIdConfig {
        self.0.job_id_config.clone()
    }

    fn set_job_id_config(&mut self, config: JobIdConfig) {
        self.0.job_id_config = config;
    }

    fn set_query_config(&mut self, config: QueryConfig) -> Result<()> {
        self.0.config = config.to_concrete()?;
        Ok(())
    }

    async fn run(&self) -> Result<Box<dyn Job>> {
        Ok(wrap_job(self.0.run().await?))
    }

    async fn read(&self) -> Result<Box<dyn RowIterator>> {
        Ok(Box::new(RowIteratorAdapter(self.0.read().await?)))
    }
}

#[async_trait]
impl RowIterator for RowIteratorAdapter {
    fn set_start_index(&mut self, index: u64) {
        self.0.set_start_index(index)
    }

    fn schema(&self) -> Schema {
        self.0.schema().clone()
    }

    fn total_rows(&self) -> u64 {
        self.0.total_rows()
    }

    async fn next(&mut self) -> Result<Option<Vec<Value>>> {
        self.0.next().await
    }

    fn page_info(&self) -> PageInfo {
        self.0.page_info().clone()
    }

    fn set_page_info(&mut self, info: PageInfo) {
        set_page_info(self.0.page_info_mut(), info)
    }
}

#[async_trait]
impl Table for TableAdapter {
    fn project_id(&self) -> String {
        self.0.project_id.clone()
    }

    fn dataset_id(&self) -> String {
        self.0.dataset_id.clone()
    }

    fn table_id(&self) -> String {
        self.0.table_id.clone()
    }

    fn fully_qualified_name(&self) -> String {
        self.0.fully_qualified_name()
    }

    async fn create(&self, metadata: &TableMetadata) -> Result<()> {
        self.0.create(metadata).await
    }

    async fn delete(&self) -> Result<()> {
        self.0.delete().await
    }

    async fn metadata(&self) -> Result<TableMetadata> {
        self.0.metadata().await
    }

    async fn update(&self, update: TableMetadataToUpdate, etag: &str) -> Result<TableMetadata> {
        self.0.update(&update, etag).await
    }

    fn read(&self) -> Box<dyn RowIterator> {
        Box::new(RowIteratorAdapter(self.0.read()))
    }

    fn uploader(&self) -> Box<dyn Uploader> {
        Box::new(UploaderAdapter(self.0.uploader()))
    }

    fn copier_from(&self, srcs: &[Arc<dyn Table>]) -> Result<Box<dyn Copier>> {
        let srcs = srcs.iter().map(unwrap_table).collect::<Result<Vec<_>>>()?;
        Ok(Box::new(CopierAdapter(self.0.copier_from(srcs))))
    }

    fn extractor_to(&self, dst: GcsReference) -> Box<dyn Extractor> {
        Box::new(ExtractorAdapter(self.0.extractor_to(dst)))
    }

    fn loader_from(&self, src: LoadSource) -> Box<dyn Loader> {
        Box::new(LoaderAdapter(self.0.loader_from(src)))
    }

    fn as_adapted(&self) -> Option<&Arc<bigquery::Table>> {
        Some(&self.0)
    }
}

#[async_trait]
impl TableIterator for TableIteratorAdapter {
    async fn next(&mut self) -> Result<Option<Box<dyn Table>>> {
        Ok(self
            .0
            .next()
            .await?
            .map(|t| Box::new(TableAdapter(Arc::new(t))) as Box<dyn Table>))
    }

    fn page_info(&self) -> PageInfo {
        self.0.page_info().clone()
    }

    fn set_page_info(&mut self, info: PageInfo) {
        set_page_info(self.0.page_info_mut(), info)
    }
}

#[async_trait]
impl Uploader for UploaderAdapter {
    fn set_skip_invalid_rows(&mut self, skip: bool) {
        self.0.skip_invalid_rows = skip;
    }

    fn set_ignore_unknown_values(&mut self, ignore: bool) {
        self.0.ignore_unknown_values = ignore;
    }

    fn set_table_template_suffix(&mut self, suffix: &str) {
        self.0.table_template_suffix = suffix.to_string();
    }

    async fn put(&self, rows: &[InsertRow]) -> Result<()> {
        self.0.put(rows).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bigquery::iface::structs::wrap_table;
    use crate::bigquery::iface::Unimplemented;
    use crate::transport::HttpTransport;
    use crate::Error;
    use httpmock::prelude::*;
    use serde_json::json;

    fn client(server: &MockServer) -> Box<dyn Client> {
        adapt_client(bigquery::Client::new(
            "proj",
            HttpTransport::new(&server.url("/v2/")).unwrap(),
        ))
    }

    #[test]
    fn test_table_wrap_unwrap_is_identity() {
        let server = MockServer::start();
        let concrete = Arc::new(
            bigquery::Client::new("proj", HttpTransport::new(&server.url("/v2/")).unwrap())
                .dataset("d")
                .table("t"),
        );
        let wrapped = wrap_table(concrete.clone());
        assert!(Arc::ptr_eq(&unwrap_table(&wrapped).unwrap(), &concrete));
        assert_eq!(wrapped.fully_qualified_name(), "proj:d.t");
    }

    #[test]
    fn test_copier_rejects_foreign_tables() {
        let server = MockServer::start();
        let table = client(&server).dataset("d").table("t");
        let foreign: Arc<dyn Table> = Arc::new(Unimplemented);
        assert!(matches!(
            table.copier_from(&[foreign]).err(),
            Some(Error::AdapterMismatch { .. })
        ));
    }

    #[tokio::test]
    async fn test_errors_pass_through_unchanged() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/v2/projects/proj/datasets/missing");
            then.status(404).json_body(json!({
                "error": {"code": 404, "message": "Not found: Dataset proj:missing", "status": "NOT_FOUND"}
            }));
        });

        let err = client(&server).dataset("missing").metadata().await.unwrap_err();
        match err {
            Error::Api { status, code, message } => {
                assert_eq!(status, 404);
                assert_eq!(code, "NOT_FOUND");
                assert_eq!(message, "Not found: Dataset proj:missing");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_copier_runs_through_adapters() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST).path("/v2/projects/proj/jobs").json_body_partial(
                r#"{"jobReference": {"jobId": "cp"}, "configuration": {"copy": {
                    "sourceTables": [{"projectId": "proj", "datasetId": "d", "tableId": "a"}],
                    "destinationTable": {"projectId": "proj", "datasetId": "d", "tableId": "b"}
                }}}"#,
            );
            then.status(200).json_body(json!({
                "jobReference": {"projectId": "proj", "jobId": "cp"},
                "status": {"state": "DONE"}
            }));
        });

        let client = client(&server);
        let ds = client.dataset("d");
        let src: Arc<dyn Table> = Arc::from(ds.table("a"));
        let mut copier = ds.table("b").copier_from(&[src]).unwrap();
        copier.set_job_id_config(JobIdConfig {
            job_id: "cp".to_string(),
            ..JobIdConfig::default()
        });
        assert_eq!(copier.job_id_config().job_id, "cp");

        let job = copier.run().await.unwrap();
        assert_eq!(job.id(), "cp");
        assert!(job.last_status().unwrap().done());
        mock.assert();
    }

    #[tokio::test]
    async fn test_query_config_dst_is_unwrapped() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST).path("/v2/projects/proj/jobs").json_body_partial(
                r#"{"configuration": {"query": {
                    "query": "SELECT 1",
                    "destinationTable": {"projectId": "proj", "datasetId": "d", "tableId": "out"}
                }}}"#,
            );
            then.status(200).json_body(json!({
                "jobReference": {"projectId": "proj", "jobId": "q"}
            }));
        });

        let client = client(&server);
        let mut query = client.query("ignored");
        query
            .set_query_config(QueryConfig {
                dst: Some(Arc::from(client.dataset("d").table("out"))),
                ..QueryConfig::new("SELECT 1")
            })
            .unwrap();
        query.run().await.unwrap();
        mock.assert();
    }

    #[tokio::test]
    async fn test_dataset_iterator_settings_are_forwarded() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/v2/projects/other/datasets")
                .query_param("all", "true")
                .query_param("maxResults", "5");
            then.status(200).json_body(json!({
                "datasets": [{"datasetReference": {"projectId": "other", "datasetId": "a"}}]
            }));
        });

        let mut it = client(&server).datasets();
        it.set_project_id("other");
        it.set_list_hidden(true);
        it.set_page_info(PageInfo {
            max_size: 5,
            ..PageInfo::default()
        });
        let ds = it.next().await.unwrap().unwrap();
        assert_eq!(ds.project_id(), "other");
        assert_eq!(ds.dataset_id(), "a");
        assert!(it.next().await.unwrap().is_none());
        mock.assert();
    }
}
