use serde::{Deserialize, Serialize};

/// A normalized LTI role identifier, spanning the System, Institution, and
/// Membership vocabularies from the IMS LIS specification.
///
/// <https://www.imsglobal.org/spec/lti/v1p3#lis-vocabulary-for-system-roles>
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    SystemAdministrator,
    SystemNone,
    SystemAccountAdmin,
    SystemCreator,
    SystemSysAdmin,
    SystemSysSupport,
    SystemUser,
    SystemTestUser,

    InstitutionAdministrator,
    InstitutionFaculty,
    InstitutionGuest,
    InstitutionNone,
    InstitutionOther,
    InstitutionStaff,
    InstitutionStudent,
    InstitutionAlumni,
    InstitutionInstructor,
    InstitutionLearner,
    InstitutionMember,
    InstitutionMentor,
    InstitutionObserver,
    InstitutionProspectiveStudent,

    MembershipAdministrator,
    MembershipContentDeveloper,
    MembershipInstructor,
    MembershipLearner,
    MembershipMentor,
    MembershipManager,
    MembershipMember,
    MembershipOfficer,

    /// A role URI this mapping does not recognize. Parsing a role URI never fails;
    /// unrecognized vocabulary falls through here instead.
    Unknown,
}

impl Role {
    /// Maps a full LTI/LIS role URI onto a normalized [`Role`]. Total: any input
    /// string produces a value, defaulting to [`Role::Unknown`].
    #[must_use]
    pub fn parse_uri(uri: &str) -> Self {
        match uri {
            "http://purl.imsglobal.org/vocab/lis/v2/system/person#Administrator" => {
                Self::SystemAdministrator
            }
            "http://purl.imsglobal.org/vocab/lis/v2/system/person#None" => Self::SystemNone,
            "http://purl.imsglobal.org/vocab/lis/v2/system/person#AccountAdmin" => {
                Self::SystemAccountAdmin
            }
            "http://purl.imsglobal.org/vocab/lis/v2/system/person#Creator" => Self::SystemCreator,
            "http://purl.imsglobal.org/vocab/lis/v2/system/person#SysAdmin" => {
                Self::SystemSysAdmin
            }
            "http://purl.imsglobal.org/vocab/lis/v2/system/person#SysSupport" => {
                Self::SystemSysSupport
            }
            "http://purl.imsglobal.org/vocab/lis/v2/system/person#User" => Self::SystemUser,
            "http://purl.imsglobal.org/vocab/lti/system/person#TestUser" => Self::SystemTestUser,

            "http://purl.imsglobal.org/vocab/lis/v2/institution/person#Administrator" => {
                Self::InstitutionAdministrator
            }
            "http://purl.imsglobal.org/vocab/lis/v2/institution/person#Faculty" => {
                Self::InstitutionFaculty
            }
            "http://purl.imsglobal.org/vocab/lis/v2/institution/person#Guest" => {
                Self::InstitutionGuest
            }
            "http://purl.imsglobal.org/vocab/lis/v2/institution/person#None" => {
                Self::InstitutionNone
            }
            "http://purl.imsglobal.org/vocab/lis/v2/institution/person#Other" => {
                Self::InstitutionOther
            }
            "http://purl.imsglobal.org/vocab/lis/v2/institution/person#Staff" => {
                Self::InstitutionStaff
            }
            "http://purl.imsglobal.org/vocab/lis/v2/institution/person#Student" => {
                Self::InstitutionStudent
            }
            "http://purl.imsglobal.org/vocab/lis/v2/institution/person#Alumni" => {
                Self::InstitutionAlumni
            }
            "http://purl.imsglobal.org/vocab/lis/v2/institution/person#Instructor" => {
                Self::InstitutionInstructor
            }
            "http://purl.imsglobal.org/vocab/lis/v2/institution/person#Learner" => {
                Self::InstitutionLearner
            }
            "http://purl.imsglobal.org/vocab/lis/v2/institution/person#Member" => {
                Self::InstitutionMember
            }
            "http://purl.imsglobal.org/vocab/lis/v2/institution/person#Mentor" => {
                Self::InstitutionMentor
            }
            "http://purl.imsglobal.org/vocab/lis/v2/institution/person#Observer" => {
                Self::InstitutionObserver
            }
            "http://purl.imsglobal.org/vocab/lis/v2/institution/person#ProspectiveStudent" => {
                Self::InstitutionProspectiveStudent
            }

            "http://purl.imsglobal.org/vocab/lis/v2/membership#Administrator" => {
                Self::MembershipAdministrator
            }
            "http://purl.imsglobal.org/vocab/lis/v2/membership#ContentDeveloper" => {
                Self::MembershipContentDeveloper
            }
            "http://purl.imsglobal.org/vocab/lis/v2/membership#Instructor" => {
                Self::MembershipInstructor
            }
            "http://purl.imsglobal.org/vocab/lis/v2/membership#Learner" => Self::MembershipLearner,
            "http://purl.imsglobal.org/vocab/lis/v2/membership#Mentor" => Self::MembershipMentor,
            "http://purl.imsglobal.org/vocab/lis/v2/membership#Manager" => Self::MembershipManager,
            "http://purl.imsglobal.org/vocab/lis/v2/membership#Member" => Self::MembershipMember,
            "http://purl.imsglobal.org/vocab/lis/v2/membership#Officer" => Self::MembershipOfficer,

            _ => Self::Unknown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_uris() {
        assert_eq!(
            Role::parse_uri("http://purl.imsglobal.org/vocab/lis/v2/membership#Instructor"),
            Role::MembershipInstructor
        );
        assert_eq!(
            Role::parse_uri("http://purl.imsglobal.org/vocab/lis/v2/system/person#SysAdmin"),
            Role::SystemSysAdmin
        );
    }

    #[test]
    fn parsing_is_total() {
        assert_eq!(Role::parse_uri(""), Role::Unknown);
        assert_eq!(Role::parse_uri("https://example.com/not-a-role"), Role::Unknown);
    }
}
