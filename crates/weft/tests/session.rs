//! End-to-end session tests over the scripted transport.

use std::time::Duration;

use tokio::time::timeout;
use weft::{Error, Session};
use weft_protocol::{
    AgentEvent, ContentData, ErrorKind, Role, ThreadInfo, ThreadItem, ThreadService,
};
use weft_test_stream::{PresetTurn, TestTransport};

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn text_event(text: &str) -> AgentEvent {
    AgentEvent::AssistantContent {
        data: ContentData::Text {
            content: Some(text.to_owned()),
        },
    }
}

fn thread(thread_id: &str, title: &str) -> ThreadInfo {
    ThreadInfo {
        user_id: "guest".to_owned(),
        thread_id: thread_id.to_owned(),
        title: title.to_owned(),
    }
}

fn item(checkpoint_id: &str, previous: &str, role: Role, text: &str) -> ThreadItem {
    let content = match role {
        Role::User => weft_protocol::ThreadItemContent::UserEvent {
            content: Some(text.to_owned()),
        },
        Role::Assistant => weft_protocol::ThreadItemContent::AssistantContent {
            data: Some(ContentData::Text {
                content: Some(text.to_owned()),
            }),
        },
    };
    ThreadItem {
        thread_id: "t1".to_owned(),
        checkpoint_id: checkpoint_id.to_owned(),
        previous_checkpoint_id: previous.to_owned(),
        role,
        content: vec![content],
    }
}

/// A transport seeded with one loaded thread: user "hi" (u1) followed
/// by assistant "hello" (a1), rooted at checkpoint "root".
fn seeded_transport() -> TestTransport {
    let transport = TestTransport::default();
    transport.add_thread(thread("t1", "greetings"));
    transport.set_items("t1", vec![
        item("u1", "root", Role::User, "hi"),
        item("a1", "u1", Role::Assistant, "hello"),
    ]);
    transport
}

async fn loaded_session(transport: TestTransport) -> Session<TestTransport> {
    let mut session = Session::new(transport);
    session.load_chats().await.unwrap();
    session
}

#[tokio::test]
async fn test_first_message_runs_a_full_turn() {
    init_logging();
    let transport = TestTransport::default();
    let mut session = Session::new(transport.clone());
    session.load_chats().await.unwrap();

    // An empty server got one chat created for us.
    assert_eq!(session.store().len(), 1);
    let chat = session.store().current_chat().unwrap();
    assert_eq!(chat.title(), "New chat");
    assert!(chat.is_content_loaded());

    transport.push_turn(PresetTurn::of(vec![
        AgentEvent::IdBeforeInvoke { id: "root".to_owned() },
        AgentEvent::UserEventId { id: "u1".to_owned() },
        AgentEvent::AssistantPartialText { text: "He".to_owned() },
        AgentEvent::AssistantPartialText { text: "llo".to_owned() },
        AgentEvent::AssistantStart { id: "a1".to_owned() },
        text_event("Hello! How can I help?"),
    ]));
    session.send_message("  hi  ").await.unwrap();

    let chat = session.store().current_chat().unwrap();
    assert!(!chat.is_generating());
    assert_eq!(chat.root_checkpoint_id(), Some("root"));
    // The first message became the title.
    assert_eq!(chat.title(), "hi");

    let visible = chat.visible_messages();
    assert_eq!(visible.len(), 2);
    // The provisional user branch was reconciled with its server id.
    assert_eq!(visible[0].id(), "u1");
    assert_eq!(visible[0].current_text(), "hi");
    // The preview was replaced by the authoritative content.
    assert_eq!(visible[1].id(), "a1");
    assert_eq!(visible[1].current_text(), "Hello! How can I help?");

    // The first turn of a thread resumes from nothing.
    let requests = transport.recorded_requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].thread_id, "thread-1");
    assert_eq!(requests[0].user_message.as_deref(), Some("hi"));
    assert_eq!(requests[0].checkpoint_id, None);

    // The auto-title also reached the server.
    let threads = transport.list_threads().await.unwrap();
    assert_eq!(threads[0].title, "hi");
}

#[tokio::test]
async fn test_second_message_resumes_from_the_tail() {
    init_logging();
    let transport = seeded_transport();
    let mut session = loaded_session(transport.clone()).await;

    transport.push_turn(PresetTurn::of(vec![
        AgentEvent::UserEventId { id: "u2".to_owned() },
        AgentEvent::AssistantStart { id: "a2".to_owned() },
        text_event("sure"),
    ]));
    session.send_message("and another thing").await.unwrap();

    let requests = transport.recorded_requests();
    assert_eq!(requests[0].checkpoint_id.as_deref(), Some("a1"));

    let chat = session.store().current_chat().unwrap();
    let visible = chat.visible_messages();
    assert_eq!(visible.len(), 4);
    assert_eq!(visible[2].id(), "u2");
    assert_eq!(visible[3].current_text(), "sure");
    // The loaded history kept its title, no auto-titling.
    assert_eq!(chat.title(), "greetings");
}

#[tokio::test]
async fn test_replay_branches_the_assistant_reply() {
    init_logging();
    let transport = seeded_transport();
    let mut session = loaded_session(transport.clone()).await;

    transport.push_turn(PresetTurn::of(vec![
        AgentEvent::AssistantStart { id: "a2".to_owned() },
        text_event("hello again"),
    ]));
    session.replay("a1").await.unwrap();

    // The turn resumed from the checkpoint before the replayed reply.
    let requests = transport.recorded_requests();
    assert_eq!(requests[0].checkpoint_id.as_deref(), Some("u1"));
    assert_eq!(requests[0].user_message, None);

    let chat = session.store().current_chat().unwrap();
    let reply = chat.tail().unwrap();
    assert_eq!(reply.branches().len(), 2);
    assert_eq!(reply.active_index(), 1);
    assert_eq!(reply.id(), "a2");
    assert_eq!(reply.current_text(), "hello again");
    // The original reply is still there on the other branch.
    assert_eq!(reply.branches()[0].id, "a1");
}

#[tokio::test]
async fn test_edit_branches_the_user_message() {
    init_logging();
    let transport = seeded_transport();
    let mut session = loaded_session(transport.clone()).await;

    transport.push_turn(PresetTurn::of(vec![
        AgentEvent::UserEventId { id: "u2".to_owned() },
        AgentEvent::AssistantStart { id: "a2".to_owned() },
        text_event("nice to meet you"),
    ]));
    session.edit_message("u1", "hi, I am Sam").await.unwrap();

    // Editing the first message resumes from the root checkpoint.
    let requests = transport.recorded_requests();
    assert_eq!(requests[0].checkpoint_id.as_deref(), Some("root"));
    assert_eq!(requests[0].user_message.as_deref(), Some("hi, I am Sam"));

    let chat = session.store().current_chat().unwrap();
    let root = chat.root_message().unwrap();
    assert_eq!(root.branches().len(), 2);
    assert_eq!(root.id(), "u2");
    assert_eq!(root.current_text(), "hi, I am Sam");

    let visible = chat.visible_messages();
    assert_eq!(visible.len(), 2);
    assert_eq!(visible[1].current_text(), "nice to meet you");

    // Switching back reveals the original exchange untouched.
    session.switch_branch("t1", "u2", 0);
    let chat = session.store().current_chat().unwrap();
    let visible = chat.visible_messages();
    assert_eq!(visible[0].current_text(), "hi");
    assert_eq!(visible[1].current_text(), "hello");
}

#[tokio::test]
async fn test_turn_in_progress_is_rejected() {
    init_logging();
    let transport = seeded_transport();
    let mut session = loaded_session(transport.clone()).await;

    session
        .store_mut()
        .current_chat_mut()
        .unwrap()
        .begin_turn();
    assert!(matches!(
        session.send_message("hi").await,
        Err(Error::TurnInProgress)
    ));
    assert!(matches!(
        session.replay("a1").await,
        Err(Error::TurnInProgress)
    ));
    // Nothing was sent.
    assert!(transport.recorded_requests().is_empty());
}

#[tokio::test]
async fn test_stream_error_keeps_partial_output() {
    init_logging();
    let transport = seeded_transport();
    let mut session = loaded_session(transport.clone()).await;

    transport.push_turn(PresetTurn::failing(
        vec![
            AgentEvent::UserEventId { id: "u2".to_owned() },
            AgentEvent::AssistantPartialText { text: "half a repl".to_owned() },
        ],
        "connection reset",
        ErrorKind::Retriable,
    ));
    let err = session.send_message("one more").await.unwrap_err();
    assert!(matches!(err, Error::Transport(_)));

    let chat = session.store().current_chat().unwrap();
    assert!(!chat.is_generating());
    // The partial preview survives the failure.
    assert_eq!(chat.tail().unwrap().current_text(), "half a repl");
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_turn_clears_the_generating_flag() {
    init_logging();
    let transport = seeded_transport();

    let mut slow = transport.clone();
    slow.set_delay(Duration::from_secs(60));
    let mut slow_session = Session::new(slow);
    slow_session.load_chats().await.unwrap();

    transport.push_turn(PresetTurn::of(vec![
        AgentEvent::UserEventId { id: "u2".to_owned() },
        text_event("too late"),
    ]));

    // Dropping the turn future mid-stream must release the chat.
    let result = timeout(Duration::from_secs(1), slow_session.send_message("hi")).await;
    assert!(result.is_err());

    let chat = slow_session.store().current_chat().unwrap();
    assert!(!chat.is_generating());
    // The optimistic user branch is still staged.
    assert_eq!(chat.tail().unwrap().current_text(), "hi");

    // And the session is usable again afterwards.
    assert!(!matches!(
        slow_session.send_message("retry").await,
        Err(Error::TurnInProgress)
    ));
}

#[tokio::test]
async fn test_create_chat_reuses_an_empty_one() {
    init_logging();
    let transport = TestTransport::default();
    let mut session = Session::new(transport.clone());
    session.load_chats().await.unwrap();
    assert_eq!(session.store().len(), 1);

    // The freshly created chat is empty, so no second thread appears.
    session.create_chat(None).await.unwrap();
    assert_eq!(session.store().len(), 1);
    assert_eq!(transport.list_threads().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_delete_chat_moves_selection() {
    init_logging();
    let transport = TestTransport::default();
    transport.add_thread(thread("t1", "one"));
    transport.add_thread(thread("t2", "two"));
    let mut session = loaded_session(transport.clone()).await;
    assert_eq!(session.store().current_id(), Some("t1"));

    session.delete_chat("t1").await.unwrap();
    assert_eq!(session.store().current_id(), Some("t2"));
    assert_eq!(transport.list_threads().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_select_chat_loads_history() {
    init_logging();
    let transport = seeded_transport();
    transport.add_thread(thread("t2", "other"));
    transport.set_items("t2", vec![
        item("u9", "root9", Role::User, "second thread"),
    ]);
    let mut session = loaded_session(transport.clone()).await;
    assert!(!session.store().get("t2").unwrap().is_content_loaded());

    session.select_chat("t2").await.unwrap();
    let chat = session.store().current_chat().unwrap();
    assert_eq!(chat.id(), "t2");
    assert!(chat.is_content_loaded());
    assert_eq!(chat.tail().unwrap().current_text(), "second thread");
}

#[tokio::test]
async fn test_empty_chat_is_auto_titled_despite_a_custom_title() {
    init_logging();
    let transport = TestTransport::default();
    let mut session = Session::new(transport.clone());
    session.load_chats().await.unwrap();
    session.rename_chat("thread-1", "Scratch").await.unwrap();

    transport.push_turn(PresetTurn::of(vec![
        AgentEvent::UserEventId { id: "u1".to_owned() },
        AgentEvent::AssistantStart { id: "a1".to_owned() },
        text_event("hi yourself"),
    ]));
    session.send_message("hello over there").await.unwrap();

    // The chat had no messages yet, so the first one names it.
    let chat = session.store().current_chat().unwrap();
    assert_eq!(chat.title(), "hello over there");
    assert_eq!(transport.list_threads().await.unwrap()[0].title, "hello over there");
}

#[tokio::test]
async fn test_load_agents_defaults_the_selection() {
    init_logging();
    let transport = seeded_transport();
    transport.set_agents(vec!["alpha".to_owned(), "beta".to_owned()]);
    let mut session = loaded_session(transport.clone()).await;

    let agents = session.load_agents().await.unwrap();
    assert_eq!(agents, ["alpha", "beta"]);
    assert_eq!(transport.selected_agent().as_deref(), Some("alpha"));

    // An existing selection is left alone.
    session.load_agents().await.unwrap();
    assert_eq!(transport.selected_agent().as_deref(), Some("alpha"));
}

#[tokio::test]
async fn test_switching_agents_reloads_chats() {
    init_logging();
    let transport = seeded_transport();
    transport.set_agents(vec!["alpha".to_owned(), "beta".to_owned()]);
    let mut session = loaded_session(transport.clone()).await;
    session.load_agents().await.unwrap();
    assert_eq!(session.store().len(), 1);

    // A new thread shows up server side; switching agents picks it up.
    transport.add_thread(thread("t2", "from beta"));
    session.select_agent(Some("beta")).await.unwrap();
    assert_eq!(transport.selected_agent().as_deref(), Some("beta"));
    assert_eq!(session.store().len(), 2);

    // Re-selecting the same agent must not reload.
    transport.add_thread(thread("t3", "ignored"));
    session.select_agent(Some("beta")).await.unwrap();
    assert_eq!(session.store().len(), 2);
}

#[tokio::test]
async fn test_rename_chat_updates_server_and_store() {
    init_logging();
    let transport = seeded_transport();
    let mut session = loaded_session(transport.clone()).await;

    session.rename_chat("t1", "salutations").await.unwrap();
    assert_eq!(session.store().get("t1").unwrap().title(), "salutations");
    assert_eq!(transport.list_threads().await.unwrap()[0].title, "salutations");
}
