use serde::{Deserialize, Serialize};
use serde_json::Value;
use validator::Validate;

use crate::models::{GroupView, MemberEmail};

#[derive(Debug, Default, Deserialize, Validate)]
pub struct CreateGroupRequest {
    #[validate(required, length(min = 1))]
    pub name: Option<String>,

    #[serde(rename = "memberEmails")]
    #[validate(required)]
    pub member_emails: Option<Vec<String>>,
}

/// Body of the add/remove member operations. `emails` stays untyped so a
/// non-array value gets its own message.
#[derive(Debug, Default, Deserialize)]
pub struct MembersRequest {
    pub emails: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DeleteGroupRequest {
    pub name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct GroupResponse {
    pub group: GroupView,
}

#[derive(Debug, Serialize)]
pub struct CreateGroupResponse {
    pub group: GroupView,
    #[serde(rename = "alreadyInGroup")]
    pub already_in_group: Vec<MemberEmail>,
    #[serde(rename = "membersNotFound")]
    pub members_not_found: Vec<MemberEmail>,
}

pub type AddMembersResponse = CreateGroupResponse;

#[derive(Debug, Serialize)]
pub struct RemoveMembersResponse {
    pub group: GroupView,
    #[serde(rename = "notInGroup")]
    pub not_in_group: Vec<MemberEmail>,
    #[serde(rename = "membersNotFound")]
    pub members_not_found: Vec<MemberEmail>,
}
