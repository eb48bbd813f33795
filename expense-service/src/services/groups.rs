use std::sync::Arc;

use serde_json::Value;
use validator::Validate;

use super::authenticator::{Audience, Requirement};
use super::error::ServiceError;
use super::store::ExpenseStore;
use crate::dtos::auth::MessageResponse;
use crate::dtos::groups::{
    AddMembersResponse, CreateGroupRequest, CreateGroupResponse, DeleteGroupRequest,
    GroupResponse, MembersRequest, RemoveMembersResponse,
};
use crate::dtos::non_blank;
use crate::middleware::Session;
use crate::models::{Group, GroupMember, GroupView, MemberEmail};
use crate::utils::is_valid_email;

/// Where a candidate member stands.
enum Candidate {
    Eligible(GroupMember),
    AlreadyInGroup(String),
    NotFound(String),
}

#[derive(Clone)]
pub struct GroupService {
    store: Arc<dyn ExpenseStore>,
}

impl GroupService {
    pub fn new(store: Arc<dyn ExpenseStore>) -> Self {
        Self { store }
    }

    /// Creates a group with the caller as a member. The caller is the owner
    /// of the stored refresh token presented with the request.
    pub async fn create(
        &self,
        session: &mut Session,
        req: CreateGroupRequest,
    ) -> Result<CreateGroupResponse, ServiceError> {
        session.require(&Requirement::Simple)?;

        let caller = match session.refresh_token() {
            Some(token) => self.store.find_user_by_refresh_token(&token).await?,
            None => None,
        }
        .ok_or_else(|| ServiceError::unauthorized("Unauthorized"))?;

        if self.store.find_group_by_member(&caller.email).await?.is_some() {
            return Err(ServiceError::validation("You are already in a group"));
        }

        req.validate()
            .map_err(|_| ServiceError::validation("Input not valid"))?;
        let (Some(name), Some(mut emails)) = (non_blank(req.name), req.member_emails) else {
            return Err(ServiceError::validation("Input not valid"));
        };
        if emails.is_empty() {
            return Err(ServiceError::validation("Input not valid"));
        }
        if !emails.contains(&caller.email) {
            emails.push(caller.email.clone());
        }

        if self.store.find_group_by_name(&name).await?.is_some() {
            return Err(ServiceError::validation(format!(
                "Group with name {} already exists!",
                name
            )));
        }

        let mut members = Vec::new();
        let mut already_in_group = Vec::new();
        let mut members_not_found = Vec::new();
        for email in dedup(emails) {
            if !is_valid_email(&email) {
                return Err(ServiceError::validation("Format of email is not valid"));
            }
            match self.classify(email).await? {
                Candidate::Eligible(member) => members.push(member),
                Candidate::AlreadyInGroup(email) => already_in_group.push(MemberEmail::new(email)),
                Candidate::NotFound(email) => members_not_found.push(MemberEmail::new(email)),
            }
        }

        let only_caller = members.len() == 1 && members[0].email == caller.email;
        if members.is_empty() || only_caller {
            return Err(ServiceError::validation("Members of the group are not valid"));
        }

        let group = Group::new(name, members);
        self.store.insert_group(&group).await?;

        tracing::info!(group = %group.name, members = group.members.len(), "Group created");
        Ok(CreateGroupResponse {
            group: GroupView::from(&group),
            already_in_group,
            members_not_found,
        })
    }

    pub async fn list(&self, session: &mut Session) -> Result<Vec<GroupView>, ServiceError> {
        session.require(&Requirement::Admin)?;
        let groups = self.store.list_groups().await?;
        Ok(groups.iter().map(GroupView::from).collect())
    }

    pub async fn get(&self, session: &mut Session, name: &str) -> Result<GroupResponse, ServiceError> {
        let group = self
            .store
            .find_group_by_name(name)
            .await?
            .ok_or_else(|| ServiceError::not_found("Group doesn't exist"))?;

        session.require_any(&[
            Requirement::Admin,
            Requirement::group(group.member_emails()),
        ])?;

        Ok(GroupResponse {
            group: GroupView::from(&group),
        })
    }

    pub async fn add_members(
        &self,
        session: &mut Session,
        name: &str,
        req: MembersRequest,
        audience: Audience,
    ) -> Result<AddMembersResponse, ServiceError> {
        let emails = parse_emails(req.emails)?;

        let mut group = self
            .store
            .find_group_by_name(name)
            .await?
            .ok_or_else(|| ServiceError::not_found("Group does not exist"))?;

        session.require(&group_requirement(&group, audience))?;

        let mut new_members = Vec::new();
        let mut already_in_group = Vec::new();
        let mut members_not_found = Vec::new();
        for email in dedup(emails) {
            match self.classify(email).await? {
                Candidate::Eligible(member) => new_members.push(member),
                Candidate::AlreadyInGroup(email) => already_in_group.push(MemberEmail::new(email)),
                Candidate::NotFound(email) => members_not_found.push(MemberEmail::new(email)),
            }
        }

        if new_members.is_empty() {
            return Err(ServiceError::validation("no new member available"));
        }

        group.members.extend(new_members);
        self.store
            .update_group_members(&group.name, &group.members)
            .await?;

        Ok(AddMembersResponse {
            group: GroupView::from(&group),
            already_in_group,
            members_not_found,
        })
    }

    /// Removes members; a group is never emptied, its first member stays.
    pub async fn remove_members(
        &self,
        session: &mut Session,
        name: &str,
        req: MembersRequest,
        audience: Audience,
    ) -> Result<RemoveMembersResponse, ServiceError> {
        let emails = parse_emails(req.emails)?;

        let mut group = self
            .store
            .find_group_by_name(name)
            .await?
            .ok_or_else(|| ServiceError::not_found("Group doesn't exist"))?;
        if group.members.len() == 1 {
            return Err(ServiceError::validation(
                "There's only one member in the group: ERROR",
            ));
        }

        session.require(&group_requirement(&group, audience))?;

        let mut to_remove = Vec::new();
        let mut not_in_group = Vec::new();
        let mut members_not_found = Vec::new();
        for email in dedup(emails) {
            if self.store.find_user_by_email(&email).await?.is_none() {
                members_not_found.push(MemberEmail::new(email));
            } else if !group.has_member(&email) {
                not_in_group.push(MemberEmail::new(email));
            } else {
                to_remove.push(email);
            }
        }

        if to_remove.is_empty() {
            return Err(ServiceError::validation("emails are not valid"));
        }
        if to_remove.len() == group.members.len() {
            let first = group.members[0].email.clone();
            to_remove.retain(|email| *email != first);
        }

        group.members.retain(|m| !to_remove.contains(&m.email));
        self.store
            .update_group_members(&group.name, &group.members)
            .await?;

        Ok(RemoveMembersResponse {
            group: GroupView::from(&group),
            not_in_group,
            members_not_found,
        })
    }

    pub async fn delete(
        &self,
        session: &mut Session,
        req: DeleteGroupRequest,
    ) -> Result<MessageResponse, ServiceError> {
        session.require(&Requirement::Admin)?;

        let name = non_blank(req.name)
            .ok_or_else(|| ServiceError::validation("name not valid or missing"))?;
        if self.store.find_group_by_name(&name).await?.is_none() {
            return Err(ServiceError::not_found("Group does not exist"));
        }

        self.store.delete_group(&name).await?;
        tracing::info!(group = %name, "Group deleted");
        Ok(MessageResponse::new("Group has been deleted"))
    }

    async fn classify(&self, email: String) -> Result<Candidate, ServiceError> {
        let Some(user) = self.store.find_user_by_email(&email).await? else {
            return Ok(Candidate::NotFound(email));
        };
        if self.store.find_group_by_member(&email).await?.is_some() {
            return Ok(Candidate::AlreadyInGroup(email));
        }
        Ok(Candidate::Eligible(GroupMember {
            email,
            user: user.id,
        }))
    }
}

fn group_requirement(group: &Group, audience: Audience) -> Requirement {
    match audience {
        Audience::Member => Requirement::group(group.member_emails()),
        Audience::Admin => Requirement::Admin,
    }
}

/// Validates the `emails` field of a membership change.
fn parse_emails(value: Option<Value>) -> Result<Vec<String>, ServiceError> {
    let value = match value {
        None | Some(Value::Null) => return Err(ServiceError::validation("Body error")),
        Some(Value::String(s)) if s.is_empty() => {
            return Err(ServiceError::validation("Body error"))
        }
        Some(value) => value,
    };

    let Value::Array(items) = value else {
        return Err(ServiceError::validation("Emails doesn't contain an array"));
    };

    items
        .into_iter()
        .map(|item| match item {
            Value::String(email) if is_valid_email(&email) => Ok(email),
            _ => Err(ServiceError::validation("Not valid email format")),
        })
        .collect()
}

/// Drops repeated emails, keeping the first occurrence.
fn dedup(emails: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    emails
        .into_iter()
        .filter(|email| seen.insert(email.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Role, User};
    use crate::services::store::MockStore;
    use crate::services::test_support::{anonymous, logged_in, seed_user, store};
    use serde_json::json;

    /// Logs `user` in by persisting the refresh token of the returned session.
    async fn login(store: &MockStore, user: &User) -> Session {
        let session = logged_in(user);
        let token = session.refresh_token().unwrap();
        store.set_refresh_token(&user.id, Some(&token)).await.unwrap();
        session
    }

    async fn family(store: &MockStore, users: &[&User]) -> Group {
        let group = Group::new(
            "family".into(),
            users
                .iter()
                .map(|u| GroupMember {
                    email: u.email.clone(),
                    user: u.id.clone(),
                })
                .collect(),
        );
        store.insert_group(&group).await.unwrap();
        group
    }

    fn create_body(name: &str, emails: &[&str]) -> CreateGroupRequest {
        CreateGroupRequest {
            name: Some(name.into()),
            member_emails: Some(emails.iter().map(|e| e.to_string()).collect()),
        }
    }

    fn members(emails: Value) -> MembersRequest {
        MembersRequest {
            emails: Some(emails),
        }
    }

    #[tokio::test]
    async fn test_create_group_classifies_members() {
        let store = store();
        let mario = seed_user(&store, "mario", Role::Regular).await;
        let luigi = seed_user(&store, "luigi", Role::Regular).await;
        let peach = seed_user(&store, "peach", Role::Regular).await;
        let toad = seed_user(&store, "toad", Role::Regular).await;
        family(&store, &[&peach]).await;
        let mut session = login(&store, &mario).await;

        let res = GroupService::new(store.clone())
            .create(
                &mut session,
                create_body(
                    "friends",
                    &[
                        luigi.email.as_str(),
                        peach.email.as_str(),
                        "ghost@example.com",
                        toad.email.as_str(),
                    ],
                ),
            )
            .await
            .unwrap();

        let names: Vec<_> = res.group.members.iter().map(|m| m.email.as_str()).collect();
        assert_eq!(names, vec![luigi.email.as_str(), toad.email.as_str(), mario.email.as_str()]);
        assert_eq!(res.already_in_group, vec![MemberEmail::new(peach.email.clone())]);
        assert_eq!(res.members_not_found, vec![MemberEmail::new("ghost@example.com")]);
        assert!(store.find_group_by_name("friends").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_create_group_rejections() {
        let store = store();
        let mario = seed_user(&store, "mario", Role::Regular).await;
        let luigi = seed_user(&store, "luigi", Role::Regular).await;
        family(&store, &[&luigi]).await;
        let service = GroupService::new(store.clone());

        let err = service
            .create(&mut anonymous(), create_body("x", &[]))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Unauthorized");

        // Valid tokens but no stored session.
        let err = service
            .create(&mut logged_in(&mario), create_body("x", &[luigi.email.as_str()]))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Unauthorized(_)));

        let mut session = login(&store, &mario).await;
        let err = service
            .create(&mut session, create_body("x", &[]))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Input not valid");

        let mut session = login(&store, &mario).await;
        let err = service
            .create(&mut session, create_body("family", &[luigi.email.as_str()]))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Group with name family already exists!");

        let mut session = login(&store, &mario).await;
        let err = service
            .create(&mut session, create_body("pals", &["not-an-email"]))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Format of email is not valid");

        let mut session = login(&store, &mario).await;
        let err = service
            .create(&mut session, create_body("pals", &[luigi.email.as_str()]))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Members of the group are not valid");

        let mut session = login(&store, &luigi).await;
        let err = service
            .create(&mut session, create_body("pals", &[mario.email.as_str()]))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "You are already in a group");
    }

    #[tokio::test]
    async fn test_get_group_checks_existence_before_authorization() {
        let store = store();
        let mario = seed_user(&store, "mario", Role::Regular).await;
        let luigi = seed_user(&store, "luigi", Role::Regular).await;
        family(&store, &[&mario]).await;
        let service = GroupService::new(store);

        let err = service.get(&mut anonymous(), "nope").await.unwrap_err();
        assert_eq!(err.to_string(), "Group doesn't exist");

        let err = service.get(&mut logged_in(&luigi), "family").await.unwrap_err();
        assert_eq!(err.to_string(), "Not authorized for this action");

        let res = service.get(&mut logged_in(&mario), "family").await.unwrap();
        assert_eq!(res.group.members, vec![MemberEmail::new(mario.email.clone())]);
    }

    #[tokio::test]
    async fn test_add_members_validation_order() {
        let store = store();
        let mario = seed_user(&store, "mario", Role::Regular).await;
        family(&store, &[&mario]).await;
        let service = GroupService::new(store);

        let cases = [
            (None, "Body error"),
            (Some(json!("")), "Body error"),
            (Some(json!("mario@example.com")), "Emails doesn't contain an array"),
            (Some(json!(["bad"])), "Not valid email format"),
        ];
        for (emails, expected) in cases {
            let err = service
                .add_members(
                    &mut logged_in(&mario),
                    "family",
                    MembersRequest { emails },
                    Audience::Member,
                )
                .await
                .unwrap_err();
            assert_eq!(err.to_string(), expected);
        }

        let err = service
            .add_members(
                &mut logged_in(&mario),
                "nope",
                members(json!([])),
                Audience::Member,
            )
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Group does not exist");

        let err = service
            .add_members(
                &mut logged_in(&mario),
                "family",
                members(json!(["ghost@example.com"])),
                Audience::Member,
            )
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "no new member available");
    }

    #[tokio::test]
    async fn test_insert_members_requires_admin() {
        let store = store();
        let mario = seed_user(&store, "mario", Role::Regular).await;
        let luigi = seed_user(&store, "luigi", Role::Regular).await;
        let admin = seed_user(&store, "admin", Role::Admin).await;
        family(&store, &[&mario]).await;
        let service = GroupService::new(store);

        let err = service
            .add_members(
                &mut logged_in(&mario),
                "family",
                members(json!([luigi.email])),
                Audience::Admin,
            )
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Not authorized for this action");

        let res = service
            .add_members(
                &mut logged_in(&admin),
                "family",
                members(json!([luigi.email, luigi.email])),
                Audience::Admin,
            )
            .await
            .unwrap();
        assert_eq!(res.group.members.len(), 2);
    }

    #[tokio::test]
    async fn test_remove_all_members_keeps_the_first() {
        let store = store();
        let mario = seed_user(&store, "mario", Role::Regular).await;
        let luigi = seed_user(&store, "luigi", Role::Regular).await;
        let peach = seed_user(&store, "peach", Role::Regular).await;
        family(&store, &[&mario, &luigi]).await;
        let service = GroupService::new(store.clone());

        let res = service
            .remove_members(
                &mut logged_in(&luigi),
                "family",
                members(json!([mario.email, luigi.email, peach.email, "ghost@example.com"])),
                Audience::Member,
            )
            .await
            .unwrap();

        assert_eq!(res.group.members, vec![MemberEmail::new(mario.email.clone())]);
        assert_eq!(res.not_in_group, vec![MemberEmail::new(peach.email.clone())]);
        assert_eq!(res.members_not_found, vec![MemberEmail::new("ghost@example.com")]);

        let err = service
            .remove_members(
                &mut logged_in(&mario),
                "family",
                members(json!([mario.email])),
                Audience::Member,
            )
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "There's only one member in the group: ERROR");
    }

    #[tokio::test]
    async fn test_remove_members_with_nobody_removable() {
        let store = store();
        let mario = seed_user(&store, "mario", Role::Regular).await;
        let luigi = seed_user(&store, "luigi", Role::Regular).await;
        let peach = seed_user(&store, "peach", Role::Regular).await;
        family(&store, &[&mario, &luigi]).await;

        let err = GroupService::new(store)
            .remove_members(
                &mut logged_in(&mario),
                "family",
                members(json!([peach.email])),
                Audience::Member,
            )
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "emails are not valid");
    }

    #[tokio::test]
    async fn test_delete_group() {
        let store = store();
        let mario = seed_user(&store, "mario", Role::Regular).await;
        let admin = seed_user(&store, "admin", Role::Admin).await;
        family(&store, &[&mario]).await;
        let service = GroupService::new(store.clone());

        let err = service
            .delete(&mut logged_in(&admin), DeleteGroupRequest { name: None })
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "name not valid or missing");

        let err = service
            .delete(
                &mut logged_in(&admin),
                DeleteGroupRequest {
                    name: Some("nope".into()),
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Group does not exist");

        let res = service
            .delete(
                &mut logged_in(&admin),
                DeleteGroupRequest {
                    name: Some("family".into()),
                },
            )
            .await
            .unwrap();
        assert_eq!(res.message, "Group has been deleted");
        assert!(store.list_groups().await.unwrap().is_empty());
    }
}
