//! Demo task set: a chain of services that register in dependency order.

use std::cell::RefCell;
use std::rc::Rc;

use serde_json::{Value, json};
use turnloop_core::{BoxError, Params, Task, TurnLoop};

use crate::config::DemoConfig;

/// Names of the services registered so far, in registration order.
#[derive(Debug, Clone, Default)]
pub struct ServiceRegistry(Rc<RefCell<Vec<String>>>);

impl ServiceRegistry {
    pub fn add(&self, service: &str) {
        if !self.has(service) {
            self.0.borrow_mut().push(service.to_string());
        }
    }

    pub fn has(&self, service: &str) -> bool {
        self.0.borrow().iter().any(|s| s == service)
    }

    pub fn content(&self) -> Vec<String> {
        self.0.borrow().clone()
    }
}

pub fn service_name(n: usize) -> String {
    format!("service n°{n}")
}

/// Defer `demo.tasks` chained services, plus the faulty task when asked.
pub fn defer_services(lp: &TurnLoop, services: &ServiceRegistry, demo: &DemoConfig) -> Vec<Task> {
    let mut tasks: Vec<Task> = (1..=demo.tasks)
        .map(|n| {
            let wait_for = (n < demo.tasks).then(|| service_name(n + 1));
            let wait_seconds = if n == demo.tasks { demo.wait_seconds } else { 0.0 };
            defer_service(lp, services, n, wait_for, wait_seconds)
        })
        .collect();

    if demo.faulty {
        tasks.push(
            lp.defer(faulty_body, Params::new())
                .identified_by("faulty")
                .cancel_on_error(),
        );
    }
    tasks
}

fn defer_service(
    lp: &TurnLoop,
    services: &ServiceRegistry,
    n: usize,
    wait_for: Option<String>,
    wait_seconds: f64,
) -> Task {
    let inner = lp.clone();
    let services = services.clone();
    let name = service_name(n);
    let id = name.clone();

    lp.defer(
        move |args| async move {
            if let Some(dependency) = &wait_for {
                while !services.has(dependency) {
                    inner.next(json!({ "waiting_for": dependency })).await;
                }
            }
            if wait_seconds > 0.0 {
                inner.wait(wait_seconds).await;
            }
            services.add(&name);
            let greeting = args.get("greeting").and_then(Value::as_str).unwrap_or("ready");
            Ok(json!(format!("{name} {greeting}")))
        },
        Params::new(),
    )
    .identified_by(id)
}

async fn faulty_body(args: Params) -> Result<Value, BoxError> {
    let inputs: Vec<String> = match args.get("inputs") {
        Some(inputs) => serde_json::from_value(inputs.clone())?,
        None => Vec::new(),
    };
    let past_the_end = inputs.len();
    Ok(json!(inputs[past_the_end]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use turnloop_core::{ExecutionState, LoopError, params};

    fn demo(tasks: usize) -> DemoConfig {
        DemoConfig {
            tasks,
            ..DemoConfig::default()
        }
    }

    #[test]
    fn services_register_last_to_first() {
        let lp = TurnLoop::new();
        let services = ServiceRegistry::default();
        defer_services(&lp, &services, &demo(3));

        lp.run(params(json!({ "greeting": "up" }))).unwrap();

        assert_eq!(
            services.content(),
            vec!["service n°3", "service n°2", "service n°1"]
        );
        assert_eq!(lp.return_of("service n°1"), Some(json!("service n°1 up")));
    }

    #[test]
    fn faulty_task_is_registered_when_intercepting() {
        let lp = TurnLoop::new();
        lp.handle_errors();
        let services = ServiceRegistry::default();
        let tasks = defer_services(
            &lp,
            &services,
            &DemoConfig {
                tasks: 2,
                faulty: true,
                ..DemoConfig::default()
            },
        );

        lp.run(Params::new()).unwrap();

        assert_eq!(lp.error_ids().len(), 1);
        assert_eq!(tasks[2].execution_state(), ExecutionState::OnError);
        assert_eq!(lp.returns().len(), 2);
    }

    #[test]
    fn short_limit_rejects_the_head_of_the_chain() {
        let lp = TurnLoop::new();
        let services = ServiceRegistry::default();
        let tasks = defer_services(&lp, &services, &demo(4));
        tasks[0].clone().set_limit(2);

        let err = lp.run(Params::new()).unwrap_err();

        assert!(matches!(err, LoopError::MaxTries { id, .. } if id == "service n°1"));
    }
}
