use tracing::{info, warn};

use super::{Hook, HookOutcome, Next, RecordEvent};
use crate::models::{NewGlobalUserPermission, User, ROLE_ADMIN, STATUS_APPROVED};
use crate::records::Collection;

/// Grants the very first user an approved global admin permission.
///
/// Runs after the user row is committed. Every failure here is logged and
/// reported as a warning; the sign-up itself has already succeeded.
pub struct FirstUserAdminHook;

impl FirstUserAdminHook {
    fn grant_if_first(&self, event: &RecordEvent<User>) -> HookOutcome {
        let user_id = event.record.id;

        let user_count = match event.store.count_records(Collection::Users) {
            Ok(count) => count,
            Err(err) => {
                warn!(%user_id, error = %err, "failed to count user records");
                return HookOutcome::warning(format!("failed to count users: {err}"));
            }
        };

        if user_count != 1 {
            return HookOutcome::Continue;
        }

        if let Err(err) = event
            .store
            .find_collection(Collection::GlobalUserPermissions.name())
        {
            warn!(%user_id, error = %err, "cannot grant first user admin permission");
            return HookOutcome::warning(err.to_string());
        }

        let permission = NewGlobalUserPermission {
            id: user_id,
            user_id,
            role: ROLE_ADMIN.to_string(),
            status: STATUS_APPROVED.to_string(),
        };

        match event.store.insert_global_user_permission(&permission) {
            Ok(_) => {
                info!(%user_id, "granted global admin permission to first user");
                HookOutcome::Continue
            }
            Err(err) => {
                warn!(%user_id, error = %err, "failed to save global user permission");
                HookOutcome::warning(format!("failed to save global user permission: {err}"))
            }
        }
    }
}

impl Hook<RecordEvent<User>> for FirstUserAdminHook {
    fn name(&self) -> &'static str {
        "first-user-admin"
    }

    fn handle(
        &self,
        event: &mut RecordEvent<User>,
        next: Next<'_, RecordEvent<User>>,
    ) -> HookOutcome {
        let own = self.grant_if_first(event);
        own.merge(next.run(event))
    }
}
