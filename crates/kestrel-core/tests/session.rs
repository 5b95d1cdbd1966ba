//! Tests for running commands against a recorded session

use std::io::Write;

use kestrel_core::commands::{live_display, pending_summary};
use kestrel_core::{execute, CommandStatus, Console, DebuggerContext, Session};

const SESSION: &str = r#"{
    "registers": {
        "arch": "x86",
        "registers": { "eax": 16, "eip": 2148536336, "ebp": 36864 }
    },
    "modules": [
        {
            "id": 1,
            "path": "/system/kernel.elf",
            "preferred_base": 2147483648,
            "actual_base": 2148532224,
            "size": 262144,
            "symbols": {
                "files": [
                    { "path": "kernel/ke/sched.c", "lines": [ { "address": 2147487744, "line": 120 }, { "address": 2147487760, "line": 124 } ] }
                ],
                "types": [
                    { "name": "int", "file": 0, "id": 1, "kind": "numeric", "bits": 32, "signed": true }
                ],
                "functions": [
                    {
                        "name": "KeSchedule",
                        "start": 2147487744,
                        "end": 2147488000,
                        "parameters": [
                            { "name": "reason", "location": { "kind": "register", "register": 0 }, "type": { "file": 0, "id": 1 } }
                        ]
                    }
                ],
                "data": [
                    { "name": "KeRunQueueDepth", "location": { "kind": "absolute", "address": 2147614720 }, "type": { "file": 0, "id": 1 } }
                ]
            }
        }
    ],
    "memory": [
        { "address": 2148663296, "bytes": [5, 0, 0, 0] }
    ],
    "profiler": [
        { "tag": 0, "data": [8, 0, 237, 254, 16, 16, 16, 128] }
    ]
}"#;

fn load() -> (Session, DebuggerContext)
{
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(SESSION.as_bytes()).unwrap();
    let session = Session::load(file.path()).unwrap();
    let context = session.context().unwrap();
    (session, context)
}

fn run(context: &mut DebuggerContext, line: &str) -> (CommandStatus, String)
{
    let console = Console::capture();
    let status = execute(context, &console, line);
    (status, console.take_captured())
}

#[test]
fn test_evaluate_and_symbolize()
{
    let (_, mut context) = load();

    // KeSchedule is at 0x80001000 in the image, loaded 0x100000 higher.
    let (status, output) = run(&mut context, "? kernel!KeSchedule+@eax");
    assert_eq!(status, CommandStatus::Success);
    assert_eq!(output, " 0x80101010 = 2148536336\n");

    let (_, output) = run(&mut context, "ln @eip");
    assert_eq!(output, "kernel!KeSchedule+0x10 [kernel/ke/sched.c:124]\n");

    context.options_mut().print_line_numbers = false;
    let (_, output) = run(&mut context, "ln @eip");
    assert_eq!(output, "kernel!KeSchedule+0x10\n");
}

#[test]
fn test_dump_and_locals()
{
    let (_, mut context) = load();

    let (status, output) = run(&mut context, "dt KeRunQueueDepth");
    assert_eq!(status, CommandStatus::Success);
    assert_eq!(output, "5\n");

    let (status, output) = run(&mut context, "dt reason");
    assert_eq!(status, CommandStatus::Success);
    assert_eq!(output, "16\n");

    let (status, output) = run(&mut context, "dv");
    assert_eq!(status, CommandStatus::Success);
    assert!(output.starts_with("@eax"));
    assert!(output.contains("reason"));
}

#[test]
fn test_replayed_stack_samples()
{
    let (session, mut context) = load();
    let pushed = session.replay(context.profiler().sink(), context.profiler().shutdown());
    assert_eq!(pushed, 1);
    assert!(pending_summary(&context).contains("stack"));

    let (status, output) = run(&mut context, "profiler stack dump");
    assert_eq!(status, CommandStatus::Success);
    assert!(output.contains("kernel!KeSchedule+0x10"));
    assert!(output.contains("100%, 1"));
}

#[test]
fn test_live_display_only_when_started()
{
    let (session, mut context) = load();
    session.replay(context.profiler().sink(), context.profiler().shutdown());
    assert!(live_display(&mut context).unwrap().is_empty());

    let (status, _) = run(&mut context, "profiler stack start");
    assert_eq!(status, CommandStatus::Success);
    assert!(live_display(&mut context).unwrap().contains("kernel!KeSchedule"));
}

#[test]
fn test_failures_keep_session_usable()
{
    let (_, mut context) = load();

    let (status, output) = run(&mut context, "dt NoSuchThing");
    assert_eq!(status, CommandStatus::Failed);
    assert_eq!(output.lines().count(), 1);
    assert!(output.starts_with("Error: "));

    let (status, output) = run(&mut context, "frobnicate");
    assert_eq!(status, CommandStatus::Failed);
    assert_eq!(output, "Error: Unknown command 'frobnicate'. Try 'help'.\n");

    let (status, _) = run(&mut context, "? 1+1");
    assert_eq!(status, CommandStatus::Success);
    assert_eq!(run(&mut context, "q").0, CommandStatus::Quit);
}
