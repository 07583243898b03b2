use tracing::{info, warn};
use uuid::Uuid;

use super::{Hook, HookOutcome, Next, RecordEvent};
use crate::models::{NewOrganisationUserPermission, Organisation, ROLE_ADMIN, STATUS_APPROVED};
use crate::records::{user_org_key, Collection};

/// Makes the requester an approved admin of the organisation they just created.
///
/// The organisation is created first (by the rest of the chain) so that its id
/// is known. A failure to record the membership never fails the request.
pub struct OrganisationMembershipHook;

impl Hook<RecordEvent<Organisation>> for OrganisationMembershipHook {
    fn name(&self) -> &'static str {
        "organisation-membership"
    }

    fn handle(
        &self,
        event: &mut RecordEvent<Organisation>,
        next: Next<'_, RecordEvent<Organisation>>,
    ) -> HookOutcome {
        let downstream = next.run(event);
        if downstream.is_abort() {
            return downstream;
        }

        let organisation_id = event.record.id;
        let Some(requester) = event.auth.as_ref() else {
            warn!(%organisation_id, "organisation created without an authenticated requester");
            return downstream.merge(HookOutcome::warning(
                "no authenticated requester to grant membership to",
            ));
        };
        let user_id = requester.user_id;

        if let Err(err) = event
            .store
            .find_collection(Collection::OrganisationUserPermissions.name())
        {
            warn!(%organisation_id, %user_id, error = %err, "cannot record organisation membership");
            return downstream.merge(HookOutcome::warning(err.to_string()));
        }

        let membership = NewOrganisationUserPermission {
            id: Uuid::new_v4(),
            user_id,
            organisation_id,
            role: ROLE_ADMIN.to_string(),
            status: STATUS_APPROVED.to_string(),
            user_org_key: user_org_key(user_id, organisation_id),
        };

        match event.store.insert_organisation_user_permission(&membership) {
            Ok(saved) => {
                info!(
                    %organisation_id,
                    %user_id,
                    user_org_key = %saved.user_org_key,
                    "recorded organisation creator as admin"
                );
                downstream
            }
            Err(err) => {
                warn!(%organisation_id, %user_id, error = %err, "failed to save organisation membership");
                downstream.merge(HookOutcome::warning(format!(
                    "failed to save organisation membership: {err}"
                )))
            }
        }
    }
}
