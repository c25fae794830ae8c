//! Named chat profiles: the agent line-ups the shell can host.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use confab_config::AppConfig;
use confab_core::{ChatMessage, LlmProvider, Tool};
use confab_llm::{shared_credential, AzureOpenAiProvider, CredentialProvider};
use confab_sandbox::{build_executor, CodeExecutor, WorkDir};
use confab_tools::{
    today, CalculatorTool, DateTool, FailureMode, ImageGeneratorTool, WebSearchTool,
};

use crate::chat::{ChatResult, LlmSettings};
use crate::conversable::{register_function, ConversableAgent};
use crate::group_chat::GroupChat;
use crate::relay::MessageObserver;
use crate::termination::TerminationPolicy;
use crate::two_agent::DirectChat;

const CODER_SYSTEM_MESSAGE: &str = "You are a helpful AI assistant.
You have access to a tool: get_today_date.
Solve tasks using your coding and language skills.
In the following cases, suggest python code (in a python coding block) or shell script (in a sh coding block) for the user to execute.
1. When you need to collect info, use the code to output the info you need, for example, browse or search the web, download/read a file, print the content of a webpage or a file, get the current date/time, check the operating system. After sufficient info is printed and the task is ready to be solved based on your language skill, you can solve the task by yourself.
2. When you need to perform some task with code, use the code to perform the task and output the result. Finish the task smartly.
Solve the task step by step if you need to.
If a plan is not provided, explain your plan first. Be clear which step uses code, and which step uses your language skill.
When using code, you must indicate the script type in the code block.
The user cannot provide any other feedback or perform any other action beyond executing the code you suggest.
The user can't modify your code. So do not suggest incomplete code which requires users to modify.
Don't use a code block if it's not intended to be executed by the user.
If you want the user to save the code in a file before executing it, put # filename: <filename> inside the code block as the first line.
Don't include multiple code blocks in one response.
Do not ask users to copy and paste the result. Instead, use 'print' function for the output when relevant.
Check the execution result returned by the user. If the result indicates there is an error, fix the error and output the code again.
Suggest the full code instead of partial code or code changes.
If the error can't be fixed or if the task is not solved even after the code is executed successfully, analyze the problem, revisit your assumption, collect additional info you need, and think of a different approach to try.
When you find an answer, verify the answer carefully. Include verifiable evidence in your response if possible.
Reply \"TERMINATE\" in the end when everything is done.";

const MULTITOOLS_USER_MESSAGE: &str = "You act on behalf of the user to monitor the assistant's actions for solving the task given by the user.
You examine if the assistant is making the right plan and suggesting the right tool to use. If it is the case, execute the tool.
Before outputing the final result, validate the web search result and make sure any image url is represented as markdown image that is visible in the chat application.";

const ADMIN_SYSTEM_MESSAGE: &str = "A human admin. Interact with the planner to discuss the plan.
Plan execution needs to be approved by this admin. Admin can execute code and tool useage.";

const IMAGE_EXPLAINER_MESSAGE: &str = "Your explain the image you see with a engaging description.";
const PLANNER_MESSAGE: &str =
    "Planner. Suggest a plan. Revise the plan based on feedback from User_proxy and critic, until admin approval.";
const CRITIC_MESSAGE: &str =
    "Critic. Double check plan, claims, code from other agents and provide feedback.";
const DATE_CHECKER_MESSAGE: &str =
    "Date Checker. You can use the get_today_date tool to get today's date.";

const TWO_AGENT_REPLY_CAP: usize = 5;
const GROUP_MAX_ROUND: usize = 10;
const GROUP_CACHE_SEED: u64 = 41;
const CODE_SCAN_WINDOW: usize = 2;
const MULTITOOLS_SEARCH_RESULTS: usize = 3;
const GROUP_SEARCH_RESULTS: usize = 7;
const IMAGE_EXPLAINER_REPLY_CAP: usize = 10;
const VISION_MAX_TOKENS: u32 = 300;

fn multitools_assistant_message() -> String {
    format!(
        "You are a helpful AI assistant that help people with complext tasks, today is {}.
You have access to 4 tools: web_searcher, image_generator, calculator and get_today_date.
You can help with multistep tasks by making an execution plan and sequentially using the tools.
Reason step by step which actions to take to get to the answer.
When you give the final answer, provide the key reasoning steps you took to get to the answer.
Return 'TERMINATE' when the task is done.",
        today()
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProfileKind {
    Coder,
    Multitools,
    GroupChat,
    Vision,
}

impl ProfileKind {
    pub const ALL: [ProfileKind; 4] = [
        ProfileKind::Coder,
        ProfileKind::Multitools,
        ProfileKind::GroupChat,
        ProfileKind::Vision,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ProfileKind::Coder => "coder",
            ProfileKind::Multitools => "multitools",
            ProfileKind::GroupChat => "groupchat",
            ProfileKind::Vision => "vision",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            ProfileKind::Coder => "Code Interpreter",
            ProfileKind::Multitools => "2 agents with multiple tools",
            ProfileKind::GroupChat => "Group Chat",
            ProfileKind::Vision => "Image Explainer",
        }
    }
}

impl fmt::Display for ProfileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProfileKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        ProfileKind::ALL
            .into_iter()
            .find(|k| k.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| anyhow::anyhow!("unknown profile '{s}' (expected one of coder, multitools, groupchat, vision)"))
    }
}

/// Shared collaborators every profile is built from.
pub struct ProfileContext {
    pub config: AppConfig,
    pub provider: Arc<dyn LlmProvider>,
    pub credential: Arc<dyn CredentialProvider>,
    pub executor: Arc<dyn CodeExecutor>,
}

impl ProfileContext {
    pub fn new(
        config: AppConfig,
        provider: Arc<dyn LlmProvider>,
        credential: Arc<dyn CredentialProvider>,
        executor: Arc<dyn CodeExecutor>,
    ) -> Self {
        Self {
            config,
            provider,
            credential,
            executor,
        }
    }

    /// Live collaborators: the Azure OpenAI endpoint, the process-wide
    /// credential, and the configured sandbox.
    pub fn from_config(config: AppConfig) -> Result<Self> {
        let provider: Arc<dyn LlmProvider> = Arc::new(AzureOpenAiProvider::from_config(&config.llm)?);
        let credential = shared_credential(&config.llm);
        let executor = build_executor(&config.sandbox);
        Ok(Self::new(config, provider, credential, executor))
    }

    fn llm(&self) -> LlmSettings {
        LlmSettings::from_config(self.provider.clone(), &self.config.llm)
    }

    fn web_search(&self, count: usize, mode: FailureMode) -> Arc<dyn Tool> {
        Arc::new(WebSearchTool::new(&self.config.search, count, mode))
    }

    fn image_generator(&self, mode: FailureMode) -> Arc<dyn Tool> {
        Arc::new(ImageGeneratorTool::from_config(&self.config, self.credential.clone(), mode))
    }
}

pub enum Orchestration {
    Direct(DirectChat),
    Group { chat: GroupChat, initiator: String },
}

/// A ready-to-run agent line-up.
pub struct ChatProfile {
    pub kind: ProfileKind,
    pub orchestration: Orchestration,
    work_dir: Option<WorkDir>,
    writes_summary: bool,
}

impl ChatProfile {
    pub fn new(kind: ProfileKind, orchestration: Orchestration) -> Self {
        Self {
            kind,
            orchestration,
            work_dir: None,
            writes_summary: false,
        }
    }

    pub fn with_work_dir(mut self, work_dir: WorkDir) -> Self {
        self.work_dir = Some(work_dir);
        self
    }

    pub fn with_summary_file(mut self) -> Self {
        self.writes_summary = true;
        self
    }

    pub fn build(kind: ProfileKind, ctx: &ProfileContext) -> Self {
        match kind {
            ProfileKind::Coder => Self::coder(ctx),
            ProfileKind::Multitools => Self::multitools(ctx),
            ProfileKind::GroupChat => Self::group_chat(ctx),
            ProfileKind::Vision => Self::vision(ctx),
        }
    }

    pub fn title(&self) -> &'static str {
        self.kind.title()
    }

    /// Shared directory for generated files, when the profile executes code.
    pub fn work_dir(&self) -> Option<&WorkDir> {
        self.work_dir.as_ref()
    }

    /// Whether the session should keep a plain-text summary file up to date.
    pub fn writes_summary(&self) -> bool {
        self.writes_summary
    }

    pub fn agent_names(&self) -> Vec<String> {
        match &self.orchestration {
            Orchestration::Direct(chat) => chat.agents().iter().map(|a| a.name().to_string()).collect(),
            Orchestration::Group { chat, .. } => chat.agent_names().into_iter().map(String::from).collect(),
        }
    }

    pub async fn run(
        &self,
        input: &str,
        history: &mut Vec<ChatMessage>,
        observer: &dyn MessageObserver,
    ) -> Result<ChatResult> {
        match &self.orchestration {
            Orchestration::Direct(chat) => chat.run(input, history, observer).await,
            Orchestration::Group { chat, initiator } => chat.run(initiator, input, history, observer).await,
        }
    }

    fn coder(ctx: &ProfileContext) -> Self {
        let mut user_proxy = ConversableAgent::new("User_proxy")
            .with_system_message("A helpful AI assistant.")
            .with_code_execution(ctx.executor.clone(), CODE_SCAN_WINDOW);
        let mut assistant = ConversableAgent::new("Assistant")
            .with_system_message(CODER_SYSTEM_MESSAGE)
            .with_llm(ctx.llm());
        register_function(Arc::new(DateTool), &mut assistant, &mut user_proxy);

        let chat = DirectChat::new(user_proxy, assistant).with_max_consecutive_auto_reply(TWO_AGENT_REPLY_CAP);
        Self::new(ProfileKind::Coder, Orchestration::Direct(chat))
            .with_work_dir(ctx.executor.work_dir().clone())
    }

    fn multitools(ctx: &ProfileContext) -> Self {
        let mut assistant = ConversableAgent::new("Assistant")
            .with_system_message(multitools_assistant_message())
            .with_llm(ctx.llm());
        let mut user = ConversableAgent::new("User")
            .with_system_message(MULTITOOLS_USER_MESSAGE)
            .with_llm(ctx.llm())
            .with_termination(TerminationPolicy::ContainsMarker);

        let tools: [Arc<dyn Tool>; 4] = [
            ctx.image_generator(FailureMode::Propagate),
            ctx.web_search(MULTITOOLS_SEARCH_RESULTS, FailureMode::Propagate),
            Arc::new(CalculatorTool),
            Arc::new(DateTool),
        ];
        for tool in tools {
            register_function(tool, &mut assistant, &mut user);
        }

        let chat = DirectChat::new(user, assistant).with_max_consecutive_auto_reply(TWO_AGENT_REPLY_CAP);
        Self::new(ProfileKind::Multitools, Orchestration::Direct(chat))
    }

    fn group_chat(ctx: &ProfileContext) -> Self {
        let llm = ctx.llm().with_temperature(0.0).with_seed(Some(GROUP_CACHE_SEED));

        let mut admin = ConversableAgent::new("Admin")
            .with_system_message(ADMIN_SYSTEM_MESSAGE)
            .with_code_execution(ctx.executor.clone(), CODE_SCAN_WINDOW)
            .with_termination(TerminationPolicy::ContainsMarker);
        let image_explainer = ConversableAgent::new("image-explainer")
            .with_system_message(IMAGE_EXPLAINER_MESSAGE)
            .with_llm(llm.clone())
            .multimodal()
            .with_max_consecutive_auto_reply(IMAGE_EXPLAINER_REPLY_CAP);
        let mut planner = ConversableAgent::new("Planner")
            .with_system_message(PLANNER_MESSAGE)
            .with_llm(llm.clone());
        let critic = ConversableAgent::new("Critic")
            .with_system_message(CRITIC_MESSAGE)
            .with_llm(llm.clone());
        let mut date_checker = ConversableAgent::new("Date Checker")
            .with_system_message(DATE_CHECKER_MESSAGE)
            .with_llm(llm.clone());

        register_function(Arc::new(DateTool), &mut date_checker, &mut admin);
        register_function(
            ctx.web_search(GROUP_SEARCH_RESULTS, FailureMode::ReportEmpty),
            &mut planner,
            &mut admin,
        );
        register_function(ctx.image_generator(FailureMode::ReportEmpty), &mut planner, &mut admin);

        let chat = GroupChat::new(vec![admin, image_explainer, planner, critic, date_checker])
            .with_max_round(GROUP_MAX_ROUND)
            .with_manager(llm);
        Self::new(
            ProfileKind::GroupChat,
            Orchestration::Group {
                chat,
                initiator: "Admin".into(),
            },
        )
        .with_work_dir(ctx.executor.work_dir().clone())
        .with_summary_file()
    }

    fn vision(ctx: &ProfileContext) -> Self {
        let user_proxy = ConversableAgent::new("User_proxy")
            .with_system_message("A human admin.")
            .with_max_consecutive_auto_reply(0);
        let image_explainer = ConversableAgent::new("image-explainer")
            .with_llm(ctx.llm().with_max_tokens(VISION_MAX_TOKENS))
            .multimodal()
            .with_max_consecutive_auto_reply(IMAGE_EXPLAINER_REPLY_CAP);
        Self::new(
            ProfileKind::Vision,
            Orchestration::Direct(DirectChat::new(user_proxy, image_explainer)),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relay::TranscriptRelay;
    use confab_core::StopReason;
    use confab_llm::{ApiKeyCredential, ScriptedProvider};
    use confab_sandbox::LocalExecutor;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn context(dir: &std::path::Path) -> ProfileContext {
        ProfileContext::new(
            AppConfig::default(),
            Arc::new(ScriptedProvider::new(Vec::new())),
            Arc::new(ApiKeyCredential::new("k")),
            Arc::new(LocalExecutor::new(WorkDir::new(dir), 10)),
        )
    }

    #[test]
    fn test_kind_parsing() {
        assert_eq!("coder".parse::<ProfileKind>().unwrap(), ProfileKind::Coder);
        assert_eq!("GroupChat".parse::<ProfileKind>().unwrap(), ProfileKind::GroupChat);
        assert!("streamlit".parse::<ProfileKind>().is_err());
        assert_eq!(serde_json::to_string(&ProfileKind::GroupChat).unwrap(), "\"groupchat\"");
    }

    #[test]
    fn test_profile_line_ups() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path());

        let coder = ChatProfile::build(ProfileKind::Coder, &ctx);
        assert_eq!(coder.agent_names(), vec!["User_proxy", "Assistant"]);
        assert!(coder.work_dir().is_some());

        let group = ChatProfile::build(ProfileKind::GroupChat, &ctx);
        assert_eq!(
            group.agent_names(),
            vec!["Admin", "image-explainer", "Planner", "Critic", "Date Checker"]
        );
        assert!(group.writes_summary());

        let vision = ChatProfile::build(ProfileKind::Vision, &ctx);
        assert!(!vision.writes_summary());
    }

    #[test]
    fn test_multitools_tool_wiring() {
        let dir = tempfile::tempdir().unwrap();
        let profile = ChatProfile::build(ProfileKind::Multitools, &context(dir.path()));
        let Orchestration::Direct(chat) = &profile.orchestration else {
            panic!("multitools is a two-agent chat");
        };
        assert_eq!(chat.initiator.name(), "User");
        let mut tools = chat.recipient.advertised_tools();
        tools.sort();
        assert_eq!(
            tools,
            vec!["calculator", "get_today_date", "image_generator", "web_searcher"]
        );
        assert!(chat.initiator.can_execute("web_searcher"));
        assert!(!chat.recipient.can_execute("web_searcher"));
    }

    const IMAGE_PATH: &str = "/openai/deployments/dall-e-3/images/generations";

    fn image_context(server: &MockServer, dir: &std::path::Path, script: Vec<confab_core::LlmResponse>) -> ProfileContext {
        let mut config = AppConfig::default();
        config.llm.base_url = Some(server.uri());
        config.image.model = Some("dall-e-3".into());
        ProfileContext::new(
            config,
            Arc::new(ScriptedProvider::new(script)),
            Arc::new(ApiKeyCredential::new("k")),
            Arc::new(LocalExecutor::new(WorkDir::new(dir), 10)),
        )
    }

    #[tokio::test]
    async fn test_multitools_image_request_yields_one_url() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(IMAGE_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [{"url": "https://img.example/bike.png"}]
            })))
            .expect(1)
            .mount(&server)
            .await;
        let dir = tempfile::tempdir().unwrap();
        let ctx = image_context(
            &server,
            dir.path(),
            vec![
                ScriptedProvider::tool_call("call_1", "image_generator", serde_json::json!({"prompt": "a red bicycle"})),
                ScriptedProvider::text("Here it is: ![a red bicycle](https://img.example/bike.png)\nTERMINATE"),
            ],
        );
        let profile = ChatProfile::build(ProfileKind::Multitools, &ctx);
        let relay = TranscriptRelay::new();
        let mut history = Vec::new();

        let result = profile.run("Draw a red bicycle", &mut history, &relay).await.unwrap();

        assert_eq!(result.stop_reason, StopReason::Terminated);
        assert_eq!(history[2].sender, "User");
        assert_eq!(history[2].tool_responses[0].content, "https://img.example/bike.png");
        assert_eq!(result.summary.matches("https://").count(), 1);
        assert!(relay.notices().is_empty());
    }

    #[tokio::test]
    async fn test_group_image_failure_is_reported_inline() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(IMAGE_PATH))
            .respond_with(ResponseTemplate::new(500).set_body_string("content filtered"))
            .mount(&server)
            .await;
        let dir = tempfile::tempdir().unwrap();
        let ctx = image_context(
            &server,
            dir.path(),
            vec![
                ScriptedProvider::text("Planner"),
                ScriptedProvider::tool_call("call_1", "image_generator", serde_json::json!({"prompt": "a red bicycle"})),
                ScriptedProvider::text("Critic"),
                ScriptedProvider::text("No image was produced. TERMINATE"),
            ],
        );
        let profile = ChatProfile::build(ProfileKind::GroupChat, &ctx);
        let relay = TranscriptRelay::new();
        let mut history = Vec::new();

        let result = profile.run("Draw a red bicycle", &mut history, &relay).await.unwrap();

        let senders: Vec<&str> = history.iter().map(|m| m.sender.as_str()).collect();
        assert_eq!(senders, vec!["Admin", "Planner", "Admin", "Critic"]);
        assert_eq!(history[2].tool_responses[0].content, "");
        assert_eq!(result.stop_reason, StopReason::Terminated);
        let notices = relay.notices();
        assert_eq!(notices.len(), 1);
        assert!(notices[0].starts_with("Error during image generation: "));
        assert!(!history.iter().any(|m| m.content_text().contains("https://")));
    }
}
