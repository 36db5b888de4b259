//! Folding one operation into a snapshot.

use super::data::OpData;
use super::Operation;
use crate::entity::combine;
use crate::snapshot::{
    Comment, CommentTimelineItem, LabelChangeTimelineItem, SetStatusTimelineItem,
    SetTitleTimelineItem, Snapshot, TimelineItem,
};
use tracing::warn;

impl Operation {
    /// Apply this operation to `snapshot`.
    ///
    /// The operation is expected to have passed [`Operation::validate`].
    /// Scalars are last-applied-wins; the timeline keeps every event.
    pub fn apply(&self, snapshot: &mut Snapshot) {
        let op_id = self.id();
        let author = self.author();
        let unix_time = self.timestamp();

        snapshot
            .metadata
            .insert(op_id.clone(), self.metadata().clone());
        snapshot.edited_at = unix_time;

        match self.data() {
            OpData::Create(d) => {
                snapshot.title.clone_from(&d.title);
                snapshot.author = author.clone();
                snapshot.created_at = unix_time;

                let comment = Comment {
                    id: combine(&snapshot.id, op_id),
                    author: author.clone(),
                    message: d.message.clone(),
                    files: d.files.clone(),
                    unix_time,
                };
                snapshot
                    .timeline
                    .push(TimelineItem::Create(CommentTimelineItem::new(&comment)));
                snapshot.comments.push(comment);
                snapshot.add_actor(author);
                snapshot.add_participant(author);
            }
            OpData::SetTitle(d) => {
                snapshot.title.clone_from(&d.title);
                snapshot.add_actor(author);
                snapshot
                    .timeline
                    .push(TimelineItem::SetTitle(SetTitleTimelineItem {
                        id: combine(&snapshot.id, op_id),
                        author: author.clone(),
                        unix_time,
                        title: d.title.clone(),
                        was: d.was.clone(),
                    }));
            }
            OpData::AddComment(d) => {
                let comment = Comment {
                    id: combine(&snapshot.id, op_id),
                    author: author.clone(),
                    message: d.message.clone(),
                    files: d.files.clone(),
                    unix_time,
                };
                snapshot
                    .timeline
                    .push(TimelineItem::AddComment(CommentTimelineItem::new(&comment)));
                snapshot.comments.push(comment);
                snapshot.add_actor(author);
                snapshot.add_participant(author);
            }
            OpData::EditComment(d) => {
                let target = combine(&snapshot.id, &d.target);
                let Some(item) = snapshot
                    .timeline
                    .iter_mut()
                    .filter_map(TimelineItem::as_comment_mut)
                    .find(|c| c.id() == &target)
                else {
                    warn!(
                        bug = %snapshot.id.human(),
                        target = %d.target.human(),
                        "edit targets an unknown comment, ignoring"
                    );
                    return;
                };

                item.append(&Comment {
                    id: target.clone(),
                    author: author.clone(),
                    message: d.message.clone(),
                    files: d.files.clone(),
                    unix_time,
                });
                if let Some(comment) = snapshot.comments.iter_mut().find(|c| c.id == target) {
                    comment.message.clone_from(&d.message);
                    comment.files.clone_from(&d.files);
                }
                snapshot.add_actor(author);
            }
            OpData::SetStatus(d) => {
                snapshot.status = d.status;
                snapshot.add_actor(author);
                snapshot
                    .timeline
                    .push(TimelineItem::SetStatus(SetStatusTimelineItem {
                        id: combine(&snapshot.id, op_id),
                        author: author.clone(),
                        unix_time,
                        status: d.status,
                    }));
            }
            OpData::LabelChange(d) => {
                for label in &d.added {
                    snapshot.labels.insert(label.clone());
                }
                for label in &d.removed {
                    snapshot.labels.remove(label);
                }
                snapshot.add_actor(author);
                snapshot
                    .timeline
                    .push(TimelineItem::LabelChange(LabelChangeTimelineItem {
                        id: combine(&snapshot.id, op_id),
                        author: author.clone(),
                        unix_time,
                        added: d.added.clone(),
                        removed: d.removed.clone(),
                    }));
            }
            OpData::SetMetadata(d) => {
                let Some(target) = snapshot.metadata.get_mut(&d.target) else {
                    warn!(
                        bug = %snapshot.id.human(),
                        target = %d.target.human(),
                        "metadata targets an unknown operation, ignoring"
                    );
                    return;
                };
                for (key, value) in &d.new_metadata {
                    target.entry(key.clone()).or_insert_with(|| value.clone());
                }
            }
            OpData::NoOp(_) => {}
        }
    }
}
