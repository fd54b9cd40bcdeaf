#[path = "e2e/approval_races.rs"]
mod approval_races;

#[path = "e2e/approval_timeouts.rs"]
mod approval_timeouts;

#[path = "e2e/approver_authorization.rs"]
mod approver_authorization;

#[path = "e2e/queue_restart.rs"]
mod queue_restart;

#[path = "e2e/governed_flow.rs"]
mod governed_flow;

#[path = "e2e/audit_trail.rs"]
mod audit_trail;
