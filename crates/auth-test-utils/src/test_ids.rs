//! Fixed test identifiers for deterministic tests.

// Identity provider
pub const TEST_REALM: &str = "quiz";
pub const TEST_OTHER_REALM: &str = "not-quiz";

// Users (identity provider subject IDs)
pub const TEST_USER_ALICE: &str = "0b6f5a2e-4c1d-4e8a-9f3b-1a2b3c4d5e01";
pub const TEST_USER_BOB: &str = "0b6f5a2e-4c1d-4e8a-9f3b-1a2b3c4d5e02";

pub const TEST_USERNAME_ALICE: &str = "alice";
pub const TEST_EMAIL_ALICE: &str = "alice@example.com";

// Signing Key IDs
pub const TEST_KEY_ID_1: &str = "k1";
pub const TEST_KEY_ID_2: &str = "k2";

// Scopes and roles
pub const SCOPE_OPENID_PROFILE: &str = "openid profile email";
pub const ROLE_PLAYER: &str = "player";
pub const ROLE_QUIZ_AUTHOR: &str = "quiz-author";
