//! An in-memory config service standing in for the runtimeconfig traits.

use async_trait::async_trait;
use cloud_iface::runtimeconfig::iface::{
    CreateCall, ListCall, ProjectsConfigsService, ProjectsConfigsVariablesService,
    ProjectsService, Service, UpdateCall, WatchCall,
};
use cloud_iface::runtimeconfig::{CallOption, ListVariablesResponse, Variable, WatchVariableRequest};
use cloud_iface::{Error, Result};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;

type Store = Arc<Mutex<BTreeMap<String, Variable>>>;

#[derive(Default, Clone)]
struct FakeService(Store);

impl Service for FakeService {
    fn projects(&self) -> Box<dyn ProjectsService> {
        Box::new(self.clone())
    }
}

impl ProjectsService for FakeService {
    fn configs(&self) -> Box<dyn ProjectsConfigsService> {
        Box::new(self.clone())
    }
}

impl ProjectsConfigsService for FakeService {
    fn variables(&self) -> Box<dyn ProjectsConfigsVariablesService> {
        Box::new(self.clone())
    }
}

impl ProjectsConfigsVariablesService for FakeService {
    fn create(&self, parent: &str, variable: Variable) -> Box<dyn CreateCall> {
        Box::new(Write {
            store: self.0.clone(),
            name: variable.name.clone(),
            variable,
            must_exist: false,
            parent: parent.to_string(),
        })
    }

    fn list(&self, parent: &str) -> Box<dyn ListCall> {
        Box::new(List {
            store: self.0.clone(),
            parent: parent.to_string(),
        })
    }

    fn update(&self, name: &str, variable: Variable) -> Box<dyn UpdateCall> {
        Box::new(Write {
            store: self.0.clone(),
            name: name.to_string(),
            variable,
            must_exist: true,
            parent: String::new(),
        })
    }

    fn watch(&self, name: &str, _request: WatchVariableRequest) -> Box<dyn WatchCall> {
        Box::new(Watch {
            store: self.0.clone(),
            name: name.to_string(),
        })
    }
}

struct Write {
    store: Store,
    parent: String,
    name: String,
    variable: Variable,
    must_exist: bool,
}

impl Write {
    fn apply(&self) -> Result<Variable> {
        let mut store = self.store.lock();
        if self.must_exist != store.contains_key(&self.name) {
            return Err(Error::Api {
                status: if self.must_exist { 404 } else { 409 },
                code: (if self.must_exist { "NOT_FOUND" } else { "ALREADY_EXISTS" }).to_string(),
                message: self.name.clone(),
            });
        }
        if !self.must_exist && !self.name.starts_with(&self.parent) {
            return Err(Error::Api {
                status: 400,
                code: "INVALID_ARGUMENT".to_string(),
                message: format!("{} is not under {}", self.name, self.parent),
            });
        }
        let mut variable = self.variable.clone();
        variable.name = self.name.clone();
        variable.state = "UPDATED".to_string();
        store.insert(self.name.clone(), variable.clone());
        Ok(variable)
    }
}

#[async_trait]
impl CreateCall for Write {
    async fn doit(&self, _opts: &[CallOption]) -> Result<Variable> {
        self.apply()
    }
}

#[async_trait]
impl UpdateCall for Write {
    async fn doit(&self, _opts: &[CallOption]) -> Result<Variable> {
        self.apply()
    }
}

struct List {
    store: Store,
    parent: String,
}

#[async_trait]
impl ListCall for List {
    async fn doit(&self, _opts: &[CallOption]) -> Result<ListVariablesResponse> {
        let variables = self
            .store
            .lock()
            .values()
            .filter(|v| v.name.starts_with(&self.parent))
            .cloned()
            .collect();
        Ok(ListVariablesResponse {
            variables,
            next_page_token: String::new(),
        })
    }
}

struct Watch {
    store: Store,
    name: String,
}

#[async_trait]
impl WatchCall for Watch {
    async fn doit(&self, _opts: &[CallOption]) -> Result<Variable> {
        self.store
            .lock()
            .get(&self.name)
            .cloned()
            .ok_or_else(|| Error::Api {
                status: 404,
                code: "NOT_FOUND".to_string(),
                message: self.name.clone(),
            })
    }
}

const PARENT: &str = "projects/p/configs/app";

#[tokio::test]
async fn test_create_list_update_watch() {
    let service: Box<dyn Service> = Box::new(FakeService::default());
    let variables = service.projects().configs().variables();
    let name = format!("{}/variables/feature/enabled", PARENT);

    let created = variables
        .create(PARENT, Variable::with_text(name.clone(), "false"))
        .doit(&[])
        .await
        .unwrap();
    assert_eq!(created.text.as_deref(), Some("false"));

    let listed = variables.list(PARENT).doit(&[]).await.unwrap();
    assert_eq!(listed.variables.len(), 1);
    assert_eq!(listed.variables[0].name, name);

    variables
        .update(&name, Variable::with_text("", "true"))
        .doit(&[CallOption::QuotaUser("tester".to_string())])
        .await
        .unwrap();

    let watched = variables
        .watch(&name, WatchVariableRequest::default())
        .doit(&[])
        .await
        .unwrap();
    assert_eq!(watched.text.as_deref(), Some("true"));
    assert_eq!(watched.state, "UPDATED");
}

#[tokio::test]
async fn test_duplicate_create_and_unknown_delete() {
    let service = FakeService::default();
    let variables = service.variables();
    let name = format!("{}/variables/x", PARENT);
    variables
        .create(PARENT, Variable::with_value(name.clone(), b"1"))
        .doit(&[])
        .await
        .unwrap();

    let err = variables
        .create(PARENT, Variable::with_value(name, b"2"))
        .doit(&[])
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(409));

    // The fake never implemented delete.
    let mut delete = variables.delete("anything");
    delete.recursive(true);
    assert!(matches!(delete.doit(&[]).await, Err(Error::Unimplemented { .. })));
}
