//! Blog publishing workflow
//!
//! Pure rules for who may move a blog between statuses. The blog service
//! loads and saves; everything here works on in-memory values so the rules
//! can be checked without a database.
//!
//! Staff pick the target status freely and `publish`/`reject` record the
//! moderator. Members may only `submit` (to pending) or `draft`; any other
//! request from a member is clamped to pending.

use crate::models::{Actor, Blog, BlogAction, BlogStatus};
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Permission denied: {0}")]
pub struct PermissionDenied(pub &'static str);

/// Status a freshly created blog starts in
pub fn initial_status(author: &Actor) -> BlogStatus {
    if author.is_staff() {
        BlogStatus::Published
    } else {
        BlogStatus::Pending
    }
}

/// Status that `action` leads to when requested by `actor`
pub fn target_status(actor: &Actor, action: BlogAction) -> BlogStatus {
    match (actor.is_staff(), action) {
        (_, BlogAction::Draft) => BlogStatus::Draft,
        (_, BlogAction::Submit) => BlogStatus::Pending,
        (true, BlogAction::Publish) => BlogStatus::Published,
        (true, BlogAction::Reject) => BlogStatus::Rejected,
        (false, _) => BlogStatus::Pending,
    }
}

/// Author or staff may edit
pub fn ensure_can_edit(blog: &Blog, actor: &Actor) -> Result<(), PermissionDenied> {
    if actor.can_manage(blog.author_id) {
        Ok(())
    } else {
        Err(PermissionDenied("only the author or staff can modify this blog"))
    }
}

/// Author or staff may delete, in any status
pub fn ensure_can_delete(blog: &Blog, actor: &Actor) -> Result<(), PermissionDenied> {
    if actor.can_manage(blog.author_id) {
        Ok(())
    } else {
        Err(PermissionDenied("only the author or staff can delete this blog"))
    }
}

/// Published blogs are public; anything else only to its author and staff
pub fn can_view(blog: &Blog, viewer: Option<&Actor>) -> bool {
    blog.is_published() || viewer.is_some_and(|v| v.can_manage(blog.author_id))
}

/// Action a content edit forces on `blog` when `actor` changes it.
///
/// A member editing a published or rejected blog sends it back to review,
/// which also drops the moderator's stamp. Drafts and pending blogs keep
/// their status; staff edits never move the status.
pub fn edit_action(blog: &Blog, actor: &Actor) -> Option<BlogAction> {
    match blog.status {
        _ if actor.is_staff() => None,
        BlogStatus::Published | BlogStatus::Rejected => Some(BlogAction::Submit),
        BlogStatus::Draft | BlogStatus::Pending => None,
    }
}

/// Apply `action` to `blog` in place.
///
/// Publish and reject by staff stamp the moderator; moving back to draft
/// or pending clears the stamp.
pub fn apply_transition(
    blog: &mut Blog,
    actor: &Actor,
    action: BlogAction,
    now: DateTime<Utc>,
) -> Result<(), PermissionDenied> {
    ensure_can_edit(blog, actor)?;

    let status = target_status(actor, action);
    match status {
        BlogStatus::Published | BlogStatus::Rejected => {
            blog.approved_by = Some(actor.id);
            blog.approved_at = Some(now);
        }
        BlogStatus::Draft | BlogStatus::Pending => {
            blog.approved_by = None;
            blog.approved_at = None;
        }
    }
    blog.status = status;
    blog.updated_at = now;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const AUTHOR: i64 = 10;
    const MODERATOR: i64 = 1;
    const STRANGER: i64 = 99;

    fn blog_in(status: BlogStatus) -> Blog {
        Blog::new("Title".into(), "Body".into(), AUTHOR, status)
    }

    #[test]
    fn test_initial_status() {
        assert_eq!(initial_status(&Actor::member(AUTHOR)), BlogStatus::Pending);
        assert_eq!(initial_status(&Actor::staff(MODERATOR)), BlogStatus::Published);
    }

    #[test]
    fn test_staff_publish_stamps_moderator() {
        let mut blog = blog_in(BlogStatus::Pending);
        let now = Utc::now();
        apply_transition(&mut blog, &Actor::staff(MODERATOR), BlogAction::Publish, now).unwrap();

        assert_eq!(blog.status, BlogStatus::Published);
        assert_eq!(blog.approved_by, Some(MODERATOR));
        assert_eq!(blog.approved_at, Some(now));
    }

    #[test]
    fn test_staff_reject_stamps_moderator() {
        let mut blog = blog_in(BlogStatus::Pending);
        apply_transition(&mut blog, &Actor::staff(MODERATOR), BlogAction::Reject, Utc::now())
            .unwrap();
        assert_eq!(blog.status, BlogStatus::Rejected);
        assert_eq!(blog.approved_by, Some(MODERATOR));
    }

    #[test]
    fn test_staff_draft_clears_stamp() {
        let mut blog = blog_in(BlogStatus::Published);
        blog.approved_by = Some(MODERATOR);
        blog.approved_at = Some(Utc::now());

        apply_transition(&mut blog, &Actor::staff(MODERATOR), BlogAction::Draft, Utc::now())
            .unwrap();
        assert_eq!(blog.status, BlogStatus::Draft);
        assert!(blog.approved_by.is_none());
        assert!(blog.approved_at.is_none());
    }

    #[test]
    fn test_member_publish_is_clamped_to_pending() {
        let mut blog = blog_in(BlogStatus::Draft);
        apply_transition(&mut blog, &Actor::member(AUTHOR), BlogAction::Publish, Utc::now())
            .unwrap();
        assert_eq!(blog.status, BlogStatus::Pending);
        assert!(blog.approved_by.is_none());
    }

    #[test]
    fn test_member_can_draft_and_submit() {
        let author = Actor::member(AUTHOR);
        let mut blog = blog_in(BlogStatus::Pending);

        apply_transition(&mut blog, &author, BlogAction::Draft, Utc::now()).unwrap();
        assert_eq!(blog.status, BlogStatus::Draft);
        apply_transition(&mut blog, &author, BlogAction::Submit, Utc::now()).unwrap();
        assert_eq!(blog.status, BlogStatus::Pending);
    }

    #[test]
    fn test_stranger_is_denied() {
        let mut blog = blog_in(BlogStatus::Draft);
        let stranger = Actor::member(STRANGER);
        let err = apply_transition(&mut blog, &stranger, BlogAction::Submit, Utc::now())
            .unwrap_err();
        assert!(err.to_string().contains("Permission denied"));
        assert_eq!(blog.status, BlogStatus::Draft);
    }

    #[test]
    fn test_delete_permissions() {
        for status in BlogStatus::ALL {
            let blog = blog_in(status);
            assert!(ensure_can_delete(&blog, &Actor::member(AUTHOR)).is_ok());
            assert!(ensure_can_delete(&blog, &Actor::staff(MODERATOR)).is_ok());
            assert!(ensure_can_delete(&blog, &Actor::member(STRANGER)).is_err());
        }
    }

    #[test]
    fn test_member_edit_of_moderated_blog_needs_review() {
        let member = Actor::member(AUTHOR);
        for status in [BlogStatus::Published, BlogStatus::Rejected] {
            assert_eq!(edit_action(&blog_in(status), &member), Some(BlogAction::Submit));
        }
        for status in [BlogStatus::Draft, BlogStatus::Pending] {
            assert_eq!(edit_action(&blog_in(status), &member), None);
        }
        assert_eq!(
            edit_action(&blog_in(BlogStatus::Published), &Actor::staff(MODERATOR)),
            None
        );
    }

    #[test]
    fn test_visibility() {
        let published = blog_in(BlogStatus::Published);
        assert!(can_view(&published, None));

        let draft = blog_in(BlogStatus::Draft);
        assert!(!can_view(&draft, None));
        assert!(!can_view(&draft, Some(&Actor::member(STRANGER))));
        assert!(can_view(&draft, Some(&Actor::member(AUTHOR))));
        assert!(can_view(&draft, Some(&Actor::staff(MODERATOR))));
    }

    fn status_strategy() -> impl Strategy<Value = BlogStatus> {
        prop::sample::select(BlogStatus::ALL.to_vec())
    }

    fn action_strategy() -> impl Strategy<Value = BlogAction> {
        prop::sample::select(BlogAction::ALL.to_vec())
    }

    proptest! {
        /// A member's blog never ends up published or rejected by their own hand
        #[test]
        fn prop_member_never_publishes(
            start in status_strategy(),
            actions in prop::collection::vec(action_strategy(), 1..8),
        ) {
            let author = Actor::member(AUTHOR);
            let mut blog = blog_in(start);
            for action in actions {
                apply_transition(&mut blog, &author, action, Utc::now()).unwrap();
                prop_assert!(matches!(blog.status, BlogStatus::Draft | BlogStatus::Pending));
                prop_assert!(blog.approved_by.is_none());
            }
        }

        /// Stamps are present exactly when the status is a moderation outcome
        #[test]
        fn prop_stamp_matches_status(
            start in status_strategy(),
            steps in prop::collection::vec((action_strategy(), any::<bool>()), 1..10),
        ) {
            let mut blog = blog_in(start);
            for (action, by_staff) in steps {
                let actor = if by_staff { Actor::staff(MODERATOR) } else { Actor::member(AUTHOR) };
                apply_transition(&mut blog, &actor, action, Utc::now()).unwrap();

                let moderated = matches!(blog.status, BlogStatus::Published | BlogStatus::Rejected);
                prop_assert_eq!(blog.approved_by.is_some(), moderated);
                prop_assert_eq!(blog.approved_at.is_some(), moderated);
                if moderated {
                    prop_assert_eq!(blog.approved_by, Some(MODERATOR));
                }
            }
        }

        /// Non-owners without staff rights never change anything
        #[test]
        fn prop_stranger_leaves_blog_untouched(
            start in status_strategy(),
            action in action_strategy(),
        ) {
            let mut blog = blog_in(start);
            let before = blog.clone();
            let stranger = Actor::member(STRANGER);
            prop_assert!(apply_transition(&mut blog, &stranger, action, Utc::now()).is_err());
            prop_assert_eq!(blog.status, before.status);
            prop_assert_eq!(blog.updated_at, before.updated_at);
        }
    }
}
