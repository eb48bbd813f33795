use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GroupMember {
    pub email: String,
    /// Id of the member's user document.
    pub user: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Group {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub members: Vec<GroupMember>,
}

impl Group {
    pub fn new(name: String, members: Vec<GroupMember>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name,
            members,
        }
    }

    pub fn member_emails(&self) -> Vec<String> {
        self.members.iter().map(|m| m.email.clone()).collect()
    }

    pub fn has_member(&self, email: &str) -> bool {
        self.members.iter().any(|m| m.email == email)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MemberEmail {
    pub email: String,
}

impl MemberEmail {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
        }
    }
}

/// Group as returned to clients: members are listed by email only.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GroupView {
    pub name: String,
    pub members: Vec<MemberEmail>,
}

impl From<&Group> for GroupView {
    fn from(group: &Group) -> Self {
        Self {
            name: group.name.clone(),
            members: group
                .members
                .iter()
                .map(|m| MemberEmail::new(m.email.clone()))
                .collect(),
        }
    }
}
