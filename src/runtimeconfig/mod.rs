//! Runtime Config client over the REST v1beta1 API.
//!
//! Shaped like the generated Google API clients: a [`Service`] exposes
//! nested resource services, and each operation returns a call object that
//! is configured and then executed with `doit`.

mod calls;
pub mod iface;
mod types;

pub use calls::{CreateCall, DeleteCall, ListCall, UpdateCall, WatchCall};
pub use types::{Empty, ListVariablesResponse, Variable, WatchVariableRequest};

use crate::config::{ClientConfig, ServiceKind};
use crate::transport::HttpTransport;
use crate::utils::error::Result;

/// Per-call knobs understood by every Google REST endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallOption {
    /// Attributes quota to an arbitrary string instead of the caller.
    QuotaUser(String),
    /// Restricts the response to a field mask.
    Fields(String),
    /// Requests a server-side trace under the given token.
    Trace(String),
}

impl CallOption {
    pub(crate) fn param(&self) -> (&'static str, String) {
        match self {
            CallOption::QuotaUser(user) => ("quotaUser", user.clone()),
            CallOption::Fields(fields) => ("fields", fields.clone()),
            CallOption::Trace(token) => ("trace", format!("token:{}", token)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Service {
    transport: HttpTransport,
}

impl Service {
    pub fn new(transport: HttpTransport) -> Self {
        Self { transport }
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        Ok(Self::new(HttpTransport::from_config(
            config,
            ServiceKind::RuntimeConfig,
        )?))
    }

    pub fn projects(&self) -> ProjectsService {
        ProjectsService {
            transport: self.transport.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProjectsService {
    transport: HttpTransport,
}

impl ProjectsService {
    pub fn configs(&self) -> ProjectsConfigsService {
        ProjectsConfigsService {
            transport: self.transport.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProjectsConfigsService {
    transport: HttpTransport,
}

impl ProjectsConfigsService {
    pub fn variables(&self) -> ProjectsConfigsVariablesService {
        ProjectsConfigsVariablesService {
            transport: self.transport.clone(),
        }
    }
}

/// Operations on `projects/*/configs/*/variables`. Nothing is sent until
/// the returned call's `doit` runs.
#[derive(Debug, Clone)]
pub struct ProjectsConfigsVariablesService {
    transport: HttpTransport,
}

impl ProjectsConfigsVariablesService {
    /// `parent` is the config, `projects/{project}/configs/{config}`.
    pub fn create(&self, parent: &str, variable: Variable) -> CreateCall {
        CreateCall::new(self.transport.clone(), parent, variable)
    }

    pub fn delete(&self, name: &str) -> DeleteCall {
        DeleteCall::new(self.transport.clone(), name)
    }

    pub fn list(&self, parent: &str) -> ListCall {
        ListCall::new(self.transport.clone(), parent)
    }

    pub fn update(&self, name: &str, variable: Variable) -> UpdateCall {
        UpdateCall::new(self.transport.clone(), name, variable)
    }

    pub fn watch(&self, name: &str, request: WatchVariableRequest) -> WatchCall {
        WatchCall::new(self.transport.clone(), name, request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    const CONFIG: &str = "projects/p/configs/c";

    fn variables(server: &MockServer) -> ProjectsConfigsVariablesService {
        Service::new(HttpTransport::new(&server.url("/v1beta1/")).unwrap())
            .projects()
            .configs()
            .variables()
    }

    #[tokio::test]
    async fn test_create_posts_to_parent() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/v1beta1/projects/p/configs/c/variables")
                .query_param("requestId", "r-1")
                .query_param("quotaUser", "tester")
                .json_body(json!({"name": "projects/p/configs/c/variables/greeting", "text": "hi"}));
            then.status(200).json_body(json!({
                "name": "projects/p/configs/c/variables/greeting",
                "text": "hi",
                "updateTime": "2024-01-02T03:04:05Z"
            }));
        });

        let created = variables(&server)
            .create(
                CONFIG,
                Variable::with_text("projects/p/configs/c/variables/greeting", "hi"),
            )
            .request_id("r-1")
            .doit(&[CallOption::QuotaUser("tester".to_string())])
            .await
            .unwrap();

        mock.assert();
        assert_eq!(created.text.as_deref(), Some("hi"));
    }

    #[tokio::test]
    async fn test_recursive_delete() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(DELETE)
                .path("/v1beta1/projects/p/configs/c/variables/app")
                .query_param("recursive", "true");
            then.status(200).json_body(json!({}));
        });

        let empty = variables(&server)
            .delete("projects/p/configs/c/variables/app")
            .recursive(true)
            .doit(&[])
            .await
            .unwrap();

        mock.assert();
        assert_eq!(empty, Empty {});
    }

    #[tokio::test]
    async fn test_list_and_watch() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET)
                .path("/v1beta1/projects/p/configs/c/variables")
                .query_param("returnValues", "true")
                .query_param("fields", "variables/name");
            then.status(200).json_body(json!({
                "variables": [{"name": "projects/p/configs/c/variables/a"}],
                "nextPageToken": "next"
            }));
        });
        server.mock(|when, then| {
            when.method(POST)
                .path("/v1beta1/projects/p/configs/c/variables/a:watch");
            then.status(200).json_body(json!({
                "name": "projects/p/configs/c/variables/a",
                "text": "new",
                "state": "UPDATED"
            }));
        });

        let vars = variables(&server);
        let listed = vars
            .list(CONFIG)
            .return_values(true)
            .doit(&[CallOption::Fields("variables/name".to_string())])
            .await
            .unwrap();
        assert_eq!(listed.variables.len(), 1);
        assert_eq!(listed.next_page_token, "next");

        let changed = vars
            .watch(&listed.variables[0].name, WatchVariableRequest::default())
            .doit(&[])
            .await
            .unwrap();
        assert_eq!(changed.state, "UPDATED");
    }

    #[tokio::test]
    async fn test_update_error_passes_through() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(PUT).path("/v1beta1/projects/p/configs/c/variables/a");
            then.status(404).json_body(json!({"error": {
                "code": 404, "message": "variable not found", "status": "NOT_FOUND"
            }}));
        });

        let err = variables(&server)
            .update(
                "projects/p/configs/c/variables/a",
                Variable::with_text("projects/p/configs/c/variables/a", "x"),
            )
            .doit(&[])
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_trace_option_is_prefixed() {
        assert_eq!(
            CallOption::Trace("abc".to_string()).param(),
            ("trace", "token:abc".to_string())
        );
    }
}
