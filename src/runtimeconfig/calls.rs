use super::types::{Empty, ListVariablesResponse, Variable, WatchVariableRequest};
use super::CallOption;
use crate::transport::HttpTransport;
use crate::utils::error::Result;

fn with_options(
    mut query: Vec<(&'static str, String)>,
    opts: &[CallOption],
) -> Vec<(&'static str, String)> {
    query.extend(opts.iter().map(CallOption::param));
    query
}

/// Creates a variable under a config.
#[derive(Debug, Clone)]
pub struct CreateCall {
    transport: HttpTransport,
    parent: String,
    variable: Variable,
    request_id: Option<String>,
}

impl CreateCall {
    pub(crate) fn new(transport: HttpTransport, parent: &str, variable: Variable) -> Self {
        Self {
            transport,
            parent: parent.to_string(),
            variable,
            request_id: None,
        }
    }

    /// Makes retries of the same create idempotent.
    pub fn request_id(&mut self, request_id: impl Into<String>) -> &mut Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub async fn doit(&self, opts: &[CallOption]) -> Result<Variable> {
        let mut query = Vec::new();
        if let Some(id) = &self.request_id {
            query.push(("requestId", id.clone()));
        }
        let created: Variable = self
            .transport
            .post(
                &format!("{}/variables", self.parent),
                &with_options(query, opts),
                &self.variable,
            )
            .await?;
        tracing::info!("Created variable {}", created.name);
        Ok(created)
    }
}

/// Deletes a variable, or with `recursive` every variable under a prefix.
#[derive(Debug, Clone)]
pub struct DeleteCall {
    transport: HttpTransport,
    name: String,
    recursive: bool,
}

impl DeleteCall {
    pub(crate) fn new(transport: HttpTransport, name: &str) -> Self {
        Self {
            transport,
            name: name.to_string(),
            recursive: false,
        }
    }

    pub fn recursive(&mut self, recursive: bool) -> &mut Self {
        self.recursive = recursive;
        self
    }

    pub fn is_recursive(&self) -> bool {
        self.recursive
    }

    pub async fn doit(&self, opts: &[CallOption]) -> Result<Empty> {
        let mut query = Vec::new();
        if self.recursive {
            query.push(("recursive", "true".to_string()));
        }
        self.transport
            .delete(&self.name, &with_options(query, opts))
            .await?;
        tracing::info!(recursive = self.recursive, "Deleted variable {}", self.name);
        Ok(Empty {})
    }
}

/// Lists the variables of a config, one page per call.
#[derive(Debug, Clone)]
pub struct ListCall {
    transport: HttpTransport,
    parent: String,
    filter: Option<String>,
    page_size: Option<i32>,
    page_token: Option<String>,
    return_values: bool,
}

impl ListCall {
    pub(crate) fn new(transport: HttpTransport, parent: &str) -> Self {
        Self {
            transport,
            parent: parent.to_string(),
            filter: None,
            page_size: None,
            page_token: None,
            return_values: false,
        }
    }

    /// Restricts results to names starting with the given prefix, written
    /// as `projects/p/configs/c/variables/prefix`.
    pub fn filter(&mut self, filter: impl Into<String>) -> &mut Self {
        self.filter = Some(filter.into());
        self
    }

    pub fn page_size(&mut self, page_size: i32) -> &mut Self {
        self.page_size = Some(page_size);
        self
    }

    pub fn page_token(&mut self, page_token: impl Into<String>) -> &mut Self {
        self.page_token = Some(page_token.into());
        self
    }

    /// Include the text or value of each variable in the listing.
    pub fn return_values(&mut self, return_values: bool) -> &mut Self {
        self.return_values = return_values;
        self
    }

    pub async fn doit(&self, opts: &[CallOption]) -> Result<ListVariablesResponse> {
        let mut query = Vec::new();
        if let Some(filter) = &self.filter {
            query.push(("filter", filter.clone()));
        }
        if let Some(size) = self.page_size {
            query.push(("pageSize", size.to_string()));
        }
        if let Some(token) = &self.page_token {
            query.push(("pageToken", token.clone()));
        }
        if self.return_values {
            query.push(("returnValues", "true".to_string()));
        }
        self.transport
            .get(
                &format!("{}/variables", self.parent),
                &with_options(query, opts),
            )
            .await
    }
}

/// Replaces the text or value of an existing variable.
#[derive(Debug, Clone)]
pub struct UpdateCall {
    transport: HttpTransport,
    name: String,
    variable: Variable,
}

impl UpdateCall {
    pub(crate) fn new(transport: HttpTransport, name: &str, variable: Variable) -> Self {
        Self {
            transport,
            name: name.to_string(),
            variable,
        }
    }

    pub async fn doit(&self, opts: &[CallOption]) -> Result<Variable> {
        self.transport
            .put(&self.name, &with_options(Vec::new(), opts), &self.variable)
            .await
    }
}

/// Blocks until the variable changes (or the service's watch deadline
/// passes) and returns it with its new `state`.
#[derive(Debug, Clone)]
pub struct WatchCall {
    transport: HttpTransport,
    name: String,
    request: WatchVariableRequest,
}

impl WatchCall {
    pub(crate) fn new(transport: HttpTransport, name: &str, request: WatchVariableRequest) -> Self {
        Self {
            transport,
            name: name.to_string(),
            request,
        }
    }

    pub async fn doit(&self, opts: &[CallOption]) -> Result<Variable> {
        tracing::debug!(variable = %self.name, "watching variable");
        let changed: Variable = self
            .transport
            .post(
                &format!("{}:watch", self.name),
                &with_options(Vec::new(), opts),
                &self.request,
            )
            .await?;
        tracing::debug!(variable = %changed.name, state = %changed.state, "watch returned");
        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_call_options_follow_call_params() {
        let opts = vec![
            CallOption::QuotaUser("svc".to_string()),
            CallOption::Fields("name".to_string()),
        ];
        let query = with_options(vec![("recursive", "true".to_string())], &opts);
        assert_eq!(
            query,
            vec![
                ("recursive", "true".to_string()),
                ("quotaUser", "svc".to_string()),
                ("fields", "name".to_string()),
            ]
        );
    }
}
