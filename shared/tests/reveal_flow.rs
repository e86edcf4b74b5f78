use crux_core::testing::AppTester;
use shared::{
    ApiError, App, Effect, Event, MessageId, MessageStatus, Model, Role, TimerId,
    TimerOperation, TimerOutput,
};

fn configured() -> (AppTester<App, Effect>, Model) {
    let app = AppTester::<App, Effect>::default();
    let mut model = Model::default();
    app.update(
        Event::SessionConfigured {
            api_base_url: "https://api.smartbites.test/api/".into(),
            auth_token: "tok".into(),
        },
        &mut model,
    );
    (app, model)
}

fn timer_ops(effects: Vec<Effect>) -> Vec<TimerOperation> {
    effects
        .into_iter()
        .filter_map(|effect| match effect {
            Effect::Timer(request) => Some(request.operation),
            _ => None,
        })
        .collect()
}

fn scheduled(ops: &[TimerOperation]) -> Option<TimerId> {
    ops.iter().find_map(|op| match op {
        TimerOperation::NotifyAfter { id, .. } => Some(*id),
        TimerOperation::Cancel { .. } => None,
    })
}

fn submit(app: &AppTester<App, Effect>, model: &mut Model, prompt: &str) -> MessageId {
    app.update(
        Event::PromptSubmitted {
            prompt: prompt.into(),
            image: None,
        },
        model,
    );
    let view = app.view(model);
    let placeholder = view.messages.last().expect("placeholder");
    assert_eq!(placeholder.role, Role::Assistant);
    assert_eq!(placeholder.status, MessageStatus::Thinking);
    placeholder.id
}

fn reply(app: &AppTester<App, Effect>, model: &mut Model, id: MessageId, text: &str) -> TimerId {
    let update = app.update(
        Event::ChatReplyReceived {
            message_id: id,
            result: Ok(text.into()),
        },
        model,
    );
    scheduled(&timer_ops(update.effects)).expect("reveal timer scheduled")
}

fn tick(app: &AppTester<App, Effect>, model: &mut Model, id: TimerId) -> Vec<TimerOperation> {
    let update = app.update(Event::TimerElapsed(TimerOutput::Fired { id }), model);
    timer_ops(update.effects)
}

#[test]
fn prompt_posts_to_chat_endpoint() {
    let (app, mut model) = configured();
    let update = app.update(
        Event::PromptSubmitted {
            prompt: "  high protein breakfast  ".into(),
            image: None,
        },
        &mut model,
    );

    let request = update
        .effects
        .into_iter()
        .find_map(|effect| match effect {
            Effect::Http(request) => Some(request.operation),
            _ => None,
        })
        .expect("chat request");
    assert_eq!(request.method, "POST");
    assert_eq!(request.url, "https://api.smartbites.test/api/chat/");
    assert_eq!(request.body, br#"{"prompt":"high protein breakfast"}"#.to_vec());
    assert!(request
        .headers
        .iter()
        .any(|h| h.name.eq_ignore_ascii_case("authorization") && h.value == "Token tok"));

    let view = app.view(&model);
    assert_eq!(view.messages.len(), 2);
    assert_eq!(view.messages[0].text, "high protein breakfast");
}

#[test]
fn empty_prompt_is_ignored() {
    let (app, mut model) = configured();
    app.update(
        Event::PromptSubmitted {
            prompt: "   ".into(),
            image: None,
        },
        &mut model,
    );
    assert!(app.view(&model).messages.is_empty());
}

#[test]
fn prompt_without_session_reports_error() {
    let app = AppTester::<App, Effect>::default();
    let mut model = Model::default();
    app.update(
        Event::PromptSubmitted {
            prompt: "hi".into(),
            image: None,
        },
        &mut model,
    );
    let view = app.view(&model);
    assert!(view.messages.is_empty());
    assert!(view.error.is_some());
}

#[test]
fn reply_reveals_one_character_per_tick() {
    let (app, mut model) = configured();
    let message = submit(&app, &mut model, "dinner?");
    let text = "Hello\n\nWorld";
    let timer = reply(&app, &mut model, message, text);

    let mut ticks = 0;
    let mut previous = String::new();
    loop {
        let ops = tick(&app, &mut model, timer);
        ticks += 1;

        let view = app.view(&model);
        let shown = &view.messages.last().expect("reply").text;
        assert!(shown.len() > previous.len());
        assert!(shown.starts_with(previous.as_str()));
        previous = shown.clone();

        if scheduled(&ops).is_none() {
            break;
        }
        assert!(ticks < 100, "reveal never finished");
    }

    assert_eq!(ticks, text.chars().count());
    let view = app.view(&model);
    assert_eq!(view.messages.last().map(|m| m.text.as_str()), Some(text));
    assert_eq!(view.messages.last().map(|m| m.status), Some(MessageStatus::Complete));
    assert!(!view.is_revealing);

    assert!(tick(&app, &mut model, timer).is_empty());
}

#[test]
fn stop_shows_full_text_and_cancels_timer() {
    let (app, mut model) = configured();
    let message = submit(&app, &mut model, "soup?");
    let timer = reply(&app, &mut model, message, "Simmer lentils for 20 minutes.");
    tick(&app, &mut model, timer);
    tick(&app, &mut model, timer);

    let update = app.update(Event::StopRevealRequested, &mut model);
    assert_eq!(
        timer_ops(update.effects),
        vec![TimerOperation::Cancel { id: timer }]
    );

    let view = app.view(&model);
    let last = view.messages.last().expect("reply");
    assert_eq!(last.text, "Simmer lentils for 20 minutes.");
    assert_eq!(last.status, MessageStatus::Complete);
    assert!(!view.is_revealing);

    let update = app.update(Event::StopRevealRequested, &mut model);
    assert!(timer_ops(update.effects).is_empty());
    assert!(tick(&app, &mut model, timer).is_empty());
}

#[test]
fn new_prompt_settles_the_running_reveal() {
    let (app, mut model) = configured();
    let first = submit(&app, &mut model, "one");
    let timer = reply(&app, &mut model, first, "first answer");
    tick(&app, &mut model, timer);

    let second = submit(&app, &mut model, "two");
    assert_ne!(first, second);

    let view = app.view(&model);
    let settled = view.messages.iter().find(|m| m.id == first).expect("first");
    assert_eq!(settled.text, "first answer");
    assert_eq!(settled.status, MessageStatus::Complete);
}

#[test]
fn clear_chat_resets_and_drops_late_replies() {
    let (app, mut model) = configured();
    let message = submit(&app, &mut model, "late?");

    app.update(Event::ClearChatRequested, &mut model);
    assert!(app.view(&model).messages.is_empty());

    let update = app.update(
        Event::ChatReplyReceived {
            message_id: message,
            result: Ok("too late".into()),
        },
        &mut model,
    );
    assert!(timer_ops(update.effects).is_empty());
    assert!(app.view(&model).messages.is_empty());
}

#[test]
fn failed_reply_marks_message_and_toasts() {
    let (app, mut model) = configured();
    let message = submit(&app, &mut model, "hello?");

    app.update(
        Event::ChatReplyReceived {
            message_id: message,
            result: Err(ApiError::Transport("connection reset".into())),
        },
        &mut model,
    );

    let view = app.view(&model);
    assert_eq!(view.messages.last().map(|m| m.status), Some(MessageStatus::Failed));
    assert!(view.toast.is_some());
    assert!(view.error.is_none());
}
