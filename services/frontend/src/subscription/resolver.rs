use crate::repository::{MessageRepository, Projection, RepositoryError};
use crate::schema::message::Message;
use crate::subscription::change_event::{ChangeEvent, ChangeKind};

/// Fetches the current state of the row a change event is about.
///
/// Deleted rows resolve to `None` without touching the database. For inserts and updates the
/// row is re-read by id with `projection`; `None` then means it was removed in the meantime.
#[tracing::instrument(skip(repository, projection), fields(kind = event.kind.as_str()))]
pub async fn resolve_message(
    event: &ChangeEvent,
    repository: &dyn MessageRepository,
    projection: &Projection,
) -> Result<Option<Message>, RepositoryError> {
    if event.kind == ChangeKind::Delete {
        return Ok(None);
    }

    let Some(id) = event.newrec.as_ref().and_then(|row| row.id) else {
        tracing::warn!("Change event carries no row id.");
        return Ok(None);
    };

    let message = repository.find_message(id, projection).await?;
    tracing::debug!(id, found = message.is_some(), "Resolved changed message.");
    Ok(message)
}
