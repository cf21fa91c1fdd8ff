use super::{
    CreateCall, DeleteCall, ListCall, ProjectsConfigsService, ProjectsConfigsVariablesService,
    ProjectsService, Service, UpdateCall, WatchCall,
};
use crate::runtimeconfig::{
    self, CallOption, Empty, ListVariablesResponse, Variable, WatchVariableRequest,
};
use crate::utils::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// Adapts a [`runtimeconfig::Service`] so that it satisfies the [`Service`]
/// trait.
pub fn adapt_service(service: runtimeconfig::Service) -> Box<dyn Service> {
    Box::new(ServiceAdapter(Arc::new(service)))
}

struct ServiceAdapter(Arc<runtimeconfig::Service>);
struct ProjectsAdapter(Arc<runtimeconfig::ProjectsService>);
struct ConfigsAdapter(Arc<runtimeconfig::ProjectsConfigsService>);
struct VariablesAdapter(Arc<runtimeconfig::ProjectsConfigsVariablesService>);
struct CreateCallAdapter(runtimeconfig::CreateCall);
struct DeleteCallAdapter(runtimeconfig::DeleteCall);
struct ListCallAdapter(runtimeconfig::ListCall);
struct UpdateCallAdapter(runtimeconfig::UpdateCall);
struct WatchCallAdapter(runtimeconfig::WatchCall);

impl Service for ServiceAdapter {
    fn projects(&self) -> Box<dyn ProjectsService> {
        Box::new(ProjectsAdapter(Arc::new(self.0.projects())))
    }
}

impl ProjectsService for ProjectsAdapter {
    fn configs(&self) -> Box<dyn ProjectsConfigsService> {
        Box::new(ConfigsAdapter(Arc::new(self.0.configs())))
    }
}

impl ProjectsConfigsService for ConfigsAdapter {
    fn variables(&self) -> Box<dyn ProjectsConfigsVariablesService> {
        Box::new(VariablesAdapter(Arc::new(self.0.variables())))
    }
}

impl ProjectsConfigsVariablesService for VariablesAdapter {
    fn create(&self, parent: &str, variable: Variable) -> Box<dyn CreateCall> {
        Box::new(CreateCallAdapter(self.0.create(parent, variable)))
    }

    fn delete(&self, name: &str) -> Box<dyn DeleteCall> {
        Box::new(DeleteCallAdapter(self.0.delete(name)))
    }

    fn list(&self, parent: &str) -> Box<dyn ListCall> {
        Box::new(ListCallAdapter(self.0.list(parent)))
    }

    fn update(&self, name: &str, variable: Variable) -> Box<dyn UpdateCall> {
        Box::new(UpdateCallAdapter(self.0.update(name, variable)))
    }

    fn watch(&self, name: &str, request: WatchVariableRequest) -> Box<dyn WatchCall> {
        Box::new(WatchCallAdapter(self.0.watch(name, request)))
    }
}

#[async_trait]
impl CreateCall for CreateCallAdapter {
    async fn doit(&self, opts: &[CallOption]) -> Result<Variable> {
        self.0.doit(opts).await
    }
}

#[async_trait]
impl DeleteCall for DeleteCallAdapter {
    fn recursive(&mut self, recursive: bool) {
        self.0.recursive(recursive);
    }

    async fn doit(&self, opts: &[CallOption]) -> Result<Empty> {
        self.0.doit(opts).await
    }
}

#[async_trait]
impl ListCall for ListCallAdapter {
    async fn doit(&self, opts: &[CallOption]) -> Result<ListVariablesResponse> {
        self.0.doit(opts).await
    }
}

#[async_trait]
impl UpdateCall for UpdateCallAdapter {
    async fn doit(&self, opts: &[CallOption]) -> Result<Variable> {
        self.0.doit(opts).await
    }
}

#[async_trait]
impl WatchCall for WatchCallAdapter {
    async fn doit(&self, opts: &[CallOption]) -> Result<Variable> {
        self.0.doit(opts).await
    }
}
