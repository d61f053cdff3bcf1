use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{Gh, GhError};
use crate::domain::models::MergeStrategy;

/// 미리 설정한 실패 응답: (exit_code, stderr) → `GhError::classify`
type Canned = Result<Vec<u8>, (i32, String)>;

/// 테스트용 Gh 구현체: 미리 설정된 응답을 반환
pub struct MockGh {
    search_response: Mutex<Option<Canned>>,
    /// key: repo_name → `pr list` 응답
    list_responses: Mutex<HashMap<String, Canned>>,
    /// key: "{repo_name}#{number}" → `pr view` 응답
    view_responses: Mutex<HashMap<String, Canned>>,
    /// search_prs 호출 기록: repo scope
    pub search_calls: Mutex<Vec<Vec<String>>>,
    /// pr_list 호출 기록: repo_name
    pub list_calls: Mutex<Vec<String>>,
    /// 게시된 댓글 기록: (repo_name, number, body)
    pub posted_comments: Mutex<Vec<(String, i64, String)>>,
    /// 머지 기록: (repo_name, number, strategy)
    pub merges: Mutex<Vec<(String, i64, MergeStrategy)>>,
}

impl Default for MockGh {
    fn default() -> Self {
        Self {
            search_response: Mutex::new(None),
            list_responses: Mutex::new(HashMap::new()),
            view_responses: Mutex::new(HashMap::new()),
            search_calls: Mutex::new(Vec::new()),
            list_calls: Mutex::new(Vec::new()),
            posted_comments: Mutex::new(Vec::new()),
            merges: Mutex::new(Vec::new()),
        }
    }
}

impl MockGh {
    pub fn new() -> Self {
        Self::default()
    }

    /// search_prs 응답 설정
    pub fn set_search(&self, json: &str) {
        *self.search_response.lock().unwrap() = Some(Ok(json.as_bytes().to_vec()));
    }

    /// search_prs 실패 설정
    pub fn fail_search(&self, exit_code: i32, stderr: &str) {
        *self.search_response.lock().unwrap() = Some(Err((exit_code, stderr.to_string())));
    }

    /// pr_list 응답 설정
    pub fn set_list(&self, repo_name: &str, json: &str) {
        self.list_responses
            .lock()
            .unwrap()
            .insert(repo_name.to_string(), Ok(json.as_bytes().to_vec()));
    }

    /// pr_list 실패 설정
    pub fn fail_list(&self, repo_name: &str, exit_code: i32, stderr: &str) {
        self.list_responses
            .lock()
            .unwrap()
            .insert(repo_name.to_string(), Err((exit_code, stderr.to_string())));
    }

    /// pr_view 응답 설정
    pub fn set_view(&self, repo_name: &str, number: i64, json: &str) {
        self.view_responses
            .lock()
            .unwrap()
            .insert(format!("{repo_name}#{number}"), Ok(json.as_bytes().to_vec()));
    }

    pub fn list_call_count(&self) -> usize {
        self.list_calls.lock().unwrap().len()
    }

    fn resolve(canned: Option<Canned>, what: &str) -> Result<Vec<u8>, GhError> {
        match canned {
            Some(Ok(bytes)) => Ok(bytes),
            Some(Err((code, stderr))) => Err(GhError::classify(code, &stderr)),
            None => Err(GhError::Provider {
                exit_code: 1,
                stderr: format!("no mock response for {what}"),
            }),
        }
    }
}

#[async_trait]
impl Gh for MockGh {
    async fn search_prs(
        &self,
        repos: &[String],
        _fields: &[&str],
        _limit: u32,
        _host: Option<&str>,
    ) -> Result<Vec<u8>, GhError> {
        self.search_calls.lock().unwrap().push(repos.to_vec());
        let canned = self.search_response.lock().unwrap().clone();
        Self::resolve(canned, "search prs")
    }

    async fn pr_list(
        &self,
        repo_name: &str,
        _fields: &[&str],
        _limit: u32,
        _host: Option<&str>,
    ) -> Result<Vec<u8>, GhError> {
        self.list_calls.lock().unwrap().push(repo_name.to_string());
        let canned = self.list_responses.lock().unwrap().get(repo_name).cloned();
        Self::resolve(canned, repo_name)
    }

    async fn pr_view(
        &self,
        repo_name: &str,
        number: i64,
        _fields: &[&str],
        _host: Option<&str>,
    ) -> Result<Vec<u8>, GhError> {
        let key = format!("{repo_name}#{number}");
        let canned = self.view_responses.lock().unwrap().get(&key).cloned();
        Self::resolve(canned, &key)
    }

    async fn pr_comment(
        &self,
        repo_name: &str,
        number: i64,
        body: &str,
        _host: Option<&str>,
    ) -> Result<(), GhError> {
        self.posted_comments.lock().unwrap().push((
            repo_name.to_string(),
            number,
            body.to_string(),
        ));
        Ok(())
    }

    async fn pr_merge(
        &self,
        repo_name: &str,
        number: i64,
        strategy: MergeStrategy,
        _host: Option<&str>,
    ) -> Result<(), GhError> {
        self.merges
            .lock()
            .unwrap()
            .push((repo_name.to_string(), number, strategy));
        Ok(())
    }
}
