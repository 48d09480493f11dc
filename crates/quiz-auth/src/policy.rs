//! Authorization policy: which calls may skip authentication.
//!
//! Both tables are allow-lists of exemptions. Anything not listed requires
//! authentication (fail-closed), so adding a new RPC or route without
//! touching the policy can only make it stricter.

use std::collections::HashMap;

/// Per-method gRPC policy keyed by fully-qualified method name
/// (`/package.Service/Method`).
#[derive(Debug, Clone, Default)]
pub struct MethodPolicy {
    /// Method name → may be called without authentication.
    methods: HashMap<String, bool>,
}

impl MethodPolicy {
    /// Empty policy: every method requires authentication.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `method` as callable without authentication.
    #[must_use]
    pub fn public(mut self, method: &str) -> Self {
        self.methods.insert(method.to_string(), true);
        self
    }

    /// Record `method` as requiring authentication.
    ///
    /// Equivalent to leaving it out; listing it documents intent.
    #[must_use]
    pub fn protected(mut self, method: &str) -> Self {
        self.methods.insert(method.to_string(), false);
        self
    }

    /// The quiz platform's method table.
    pub fn quiz_platform() -> Self {
        Self::new()
            // Account bootstrap
            .public("/user.v1.UserService/Register")
            .public("/user.v1.UserService/Login")
            .public("/user.v1.UserService/RefreshToken")
            // Health probes
            .public("/grpc.health.v1.Health/Check")
            .public("/grpc.health.v1.Health/Watch")
            // Users
            .protected("/user.v1.UserService/GetProfile")
            .protected("/user.v1.UserService/UpdateProfile")
            // Quizzes
            .protected("/quiz.v1.QuizService/ListQuizzes")
            .protected("/quiz.v1.QuizService/GetQuiz")
            .protected("/quiz.v1.QuizService/CreateQuiz")
            .protected("/quiz.v1.QuizService/UpdateQuiz")
            .protected("/quiz.v1.QuizService/DeleteQuiz")
            .protected("/quiz.v1.QuizService/SubmitAnswers")
            .protected("/quiz.v1.QuizService/StreamQuestions")
            // History
            .protected("/history.v1.HistoryService/ListHistory")
            .protected("/history.v1.HistoryService/GetAttempt")
            .protected("/history.v1.HistoryService/StreamHistory")
    }

    /// Whether `method` needs an authenticated caller. Unmapped → `true`.
    pub fn requires_auth(&self, method: &str) -> bool {
        !self.methods.get(method).copied().unwrap_or(false)
    }

    /// Whether `method` has an explicit entry.
    pub fn is_mapped(&self, method: &str) -> bool {
        self.methods.contains_key(method)
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }
}

/// HTTP path prefixes served without authentication at the edge.
///
/// Matching is segment-aware: `/api/v1/auth/login` matches itself and
/// `/api/v1/auth/login/…` but not `/api/v1/auth/loginx`.
#[derive(Debug, Clone, Default)]
pub struct PublicPaths {
    prefixes: Vec<String>,
}

impl PublicPaths {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a public prefix. A trailing `/` is ignored.
    #[must_use]
    pub fn with_prefix(mut self, prefix: &str) -> Self {
        let trimmed = prefix.trim_end_matches('/');
        self.prefixes.push(if trimmed.is_empty() {
            "/".to_string()
        } else {
            trimmed.to_string()
        });
        self
    }

    /// The quiz platform's edge exemptions.
    pub fn quiz_platform() -> Self {
        Self::new()
            .with_prefix("/api/v1/auth/login")
            .with_prefix("/api/v1/auth/register")
            .with_prefix("/api/v1/auth/refresh")
            .with_prefix("/health")
            .with_prefix("/metrics")
    }

    /// Whether `path` may be served without authentication.
    pub fn is_public(&self, path: &str) -> bool {
        self.prefixes.iter().any(|prefix| {
            if prefix == "/" {
                return true;
            }
            match path.strip_prefix(prefix.as_str()) {
                Some(rest) => rest.is_empty() || rest.starts_with('/'),
                None => false,
            }
        })
    }

    pub fn prefixes(&self) -> &[String] {
        &self.prefixes
    }
}
