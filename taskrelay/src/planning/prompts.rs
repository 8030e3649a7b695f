//! Prompt text for the model oracle

pub const PLAN_SYSTEM_PROMPT: &str = r#"You are a planning agent coordinating a team of assistants.
Each assistant is a separate service with its own tools. Given a conversation and the latest
request, decide which assistants must act, in which order, and what each one should do.

Answer with a single JSON object inside a ```json fenced block, shaped exactly as:
{
  "plan_name": "<short name>",
  "plan_overview": "<one paragraph summary>",
  "plan": {
    "step_1": {
      "name": "<what this step does>",
      "explanation": "<why it is needed>",
      "expected_result": "<what it should produce>",
      "assignee": "<assistant name>"
    }
  },
  "no_skills_needed": false
}

Only use assistant names from the list you are given. If the request can be answered without
any assistant, return an empty "plan" object, set "no_skills_needed" to true, and use
"null_plan" as the plan name."#;

pub fn plan_user_prompt(
    conversation: &str,
    additional_context: &str,
    assistants: &[String],
    assistant_descriptions: &str,
) -> String {
    format!(
        "{conversation}\n\n\
         Additional context:\n{additional_context}\n\n\
         Available assistants: {assistants}\n\n\
         Assistant descriptions:\n{assistant_descriptions}\n\n\
         Create a plan for the latest user request.",
        conversation = conversation,
        additional_context = additional_context,
        assistants = assistants.join(", "),
        assistant_descriptions = assistant_descriptions,
    )
}

pub fn tool_call_system_prompt(provider_description: &str) -> String {
    format!(
        "You are an assistant that completes one step of a larger plan by calling tools.\n\
         Your speciality:\n{}\n\n\
         Call at least one of the available tools. Fill every required argument from the \
         plan, the conversation and the results of earlier steps.",
        provider_description
    )
}

pub fn tool_call_user_prompt(
    plan_name: &str,
    plan_overview: &str,
    background: &str,
    task: &str,
    reason: &str,
    expectation: &str,
) -> String {
    format!(
        "Plan: {plan_name}\n\
         Overview: {plan_overview}\n\n\
         Background information:\n{background}\n\
         Your task: {task}\n\
         Reason: {reason}\n\
         Expected result: {expectation}",
        plan_name = plan_name,
        plan_overview = plan_overview,
        background = background,
        task = task,
        reason = reason,
        expectation = expectation,
    )
}

pub const ADMIN_SYSTEM_PROMPT: &str = r#"You are the administrator assistant of a chat room.
The room owner sends instructions about existing plans. Choose exactly one administrative tool
that carries out the instruction, and always include the "plan_id" argument of the plan it
concerns. If the instruction needs no administrative action, call the "idle" tool."#;

pub fn admin_user_prompt(
    conversation: &str,
    room_id: &str,
    participants: &str,
    owner_message: &str,
) -> String {
    format!(
        "{conversation}\n\n\
         Chatroom ID: {room_id}\n\
         {participants}\n\n\
         Owner instruction: {owner_message}",
        conversation = conversation,
        room_id = room_id,
        participants = participants,
        owner_message = owner_message,
    )
}
