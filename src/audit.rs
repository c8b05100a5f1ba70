use crate::{models::principal::Principal, tasks::BackgroundTasks};

/// Records that `principal` performed `action` on `resource`.
///
/// The line is written off the request path under the `audit` target.
pub fn record(
    tasks: &BackgroundTasks,
    principal: &Principal,
    action: &'static str,
    resource: String,
) {
    let subject = principal.subject.clone();
    tasks.spawn("audit", async move {
        tracing::info!(target: "audit", %subject, action, %resource, "mutation");
    });
}
