//! Trait-shaped view of the [`runtimeconfig`](crate::runtimeconfig) client.
//!
//! The nesting of the generated client is kept one trait per level, so a
//! fake can stand in at `service.projects().configs().variables()` and
//! below. Call objects are traits too; their `doit` defaults fail with
//! [`Error::Unimplemented`](crate::Error::Unimplemented).

mod adapters;

pub use adapters::adapt_service;

use crate::runtimeconfig::{CallOption, Empty, ListVariablesResponse, Variable, WatchVariableRequest};
use crate::utils::error::{unimplemented, unimplemented_default, Result};
use async_trait::async_trait;

pub trait Service: Send + Sync {
    fn projects(&self) -> Box<dyn ProjectsService> {
        Box::new(placeholder("Service::projects"))
    }
}

pub trait ProjectsService: Send + Sync {
    fn configs(&self) -> Box<dyn ProjectsConfigsService> {
        Box::new(placeholder("ProjectsService::configs"))
    }
}

pub trait ProjectsConfigsService: Send + Sync {
    fn variables(&self) -> Box<dyn ProjectsConfigsVariablesService> {
        Box::new(placeholder("ProjectsConfigsService::variables"))
    }
}

pub trait ProjectsConfigsVariablesService: Send + Sync {
    fn create(&self, _parent: &str, _variable: Variable) -> Box<dyn CreateCall> {
        Box::new(placeholder("ProjectsConfigsVariablesService::create"))
    }

    fn delete(&self, _name: &str) -> Box<dyn DeleteCall> {
        Box::new(placeholder("ProjectsConfigsVariablesService::delete"))
    }

    fn list(&self, _parent: &str) -> Box<dyn ListCall> {
        Box::new(placeholder("ProjectsConfigsVariablesService::list"))
    }

    fn update(&self, _name: &str, _variable: Variable) -> Box<dyn UpdateCall> {
        Box::new(placeholder("ProjectsConfigsVariablesService::update"))
    }

    fn watch(&self, _name: &str, _request: WatchVariableRequest) -> Box<dyn WatchCall> {
        Box::new(placeholder("ProjectsConfigsVariablesService::watch"))
    }
}

#[async_trait]
pub trait CreateCall: Send + Sync {
    async fn doit(&self, _opts: &[CallOption]) -> Result<Variable> {
        unimplemented("CreateCall::doit")
    }
}

#[async_trait]
pub trait DeleteCall: Send + Sync {
    fn recursive(&mut self, _recursive: bool) {
        unimplemented_default::<()>("DeleteCall::recursive")
    }

    async fn doit(&self, _opts: &[CallOption]) -> Result<Empty> {
        unimplemented("DeleteCall::doit")
    }
}

#[async_trait]
pub trait ListCall: Send + Sync {
    async fn doit(&self, _opts: &[CallOption]) -> Result<ListVariablesResponse> {
        unimplemented("ListCall::doit")
    }
}

#[async_trait]
pub trait UpdateCall: Send + Sync {
    async fn doit(&self, _opts: &[CallOption]) -> Result<Variable> {
        unimplemented("UpdateCall::doit")
    }
}

#[async_trait]
pub trait WatchCall: Send + Sync {
    async fn doit(&self, _opts: &[CallOption]) -> Result<Variable> {
        unimplemented("WatchCall::doit")
    }
}

/// Returned by default factory methods; implements every trait of this
/// module with nothing but the defaults.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unimplemented;

impl Service for Unimplemented {}
impl ProjectsService for Unimplemented {}
impl ProjectsConfigsService for Unimplemented {}
impl ProjectsConfigsVariablesService for Unimplemented {}
impl CreateCall for Unimplemented {}
impl DeleteCall for Unimplemented {}
impl ListCall for Unimplemented {}
impl UpdateCall for Unimplemented {}
impl WatchCall for Unimplemented {}

fn placeholder(method: &'static str) -> Unimplemented {
    unimplemented_default::<()>(method);
    Unimplemented
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    struct OnlyProjects;

    impl Service for OnlyProjects {}

    #[tokio::test]
    async fn test_default_chain_reaches_a_failing_call() {
        let vars = OnlyProjects.projects().configs().variables();

        let mut delete = vars.delete("projects/p/configs/c/variables/a");
        delete.recursive(true);
        assert!(matches!(
            delete.doit(&[]).await,
            Err(Error::Unimplemented {
                method: "DeleteCall::doit"
            })
        ));
        assert!(vars.list("projects/p/configs/c").doit(&[]).await.is_err());
    }
}
