//! Integration tests from a chat user's perspective.
//!
//! These follow an assistant reply from raw text to segments, then through
//! each action the UI offers on a code block: running it as a command,
//! running it as a script, or previewing it. No network or external LLM is
//! needed; process-spawning journeys are Unix-only.
//!
//! Run: `cargo test --test chat_journey_integration`

// ============================================================================
// 1. Reading a reply
// ============================================================================
mod reading_a_reply {
    use sandpane::extract::{ExecutionKind, Segment, extract, extract_with_diagnostics, segments};

    const REPLY: &str = "Let's set up the project.\n\n\
                         ```bash\n$ mkdir demo\n```\n\n\
                         Then check it works:\n\n\
                         ```python\nprint('ok')\n```\n\n\
                         And a quick page:\n\n\
                         ```html\n<h1>Demo</h1>\n```\n";

    #[test]
    fn test_reply_splits_in_document_order() {
        let segs = extract(REPLY);
        let kinds: Vec<Option<&str>> = segs.iter().map(Segment::language).collect();
        assert_eq!(
            kinds,
            vec![
                None,
                Some("bash"),
                None,
                Some("python"),
                None,
                Some("html"),
                None
            ]
        );
    }

    #[test]
    fn test_each_block_offers_the_right_action() {
        let segs = extract(REPLY);
        let code: Vec<&Segment> = segs.iter().filter(|s| s.is_code()).collect();

        let command = code[0].execution_request().unwrap();
        assert_eq!(command.kind, ExecutionKind::Command);
        assert_eq!(command.payload, "mkdir demo");

        let script = code[1].execution_request().unwrap();
        assert_eq!(script.kind, ExecutionKind::Script);

        assert!(code[2].execution_request().is_none());
        let files = code[2].preview_files().unwrap();
        assert_eq!(files.html.as_deref(), Some("<h1>Demo</h1>"));
    }

    #[test]
    fn test_iterator_is_restartable() {
        let iter = segments(REPLY);
        let first: Vec<Segment> = iter.clone().collect();
        let second: Vec<Segment> = iter.collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_streaming_reply_with_open_fence_degrades_to_text() {
        let partial = "Here is the code:\n```rust\nfn main() {";
        let (segs, malformed) = extract_with_diagnostics(partial);
        assert!(segs.iter().all(|s| !s.is_code()));
        assert_eq!(malformed.len(), 1);
        assert_eq!(malformed[0].offset, partial.find("```").unwrap());
    }
}

// ============================================================================
// 2. Running a command
// ============================================================================
#[cfg(unix)]
mod running_a_command {
    use std::sync::Arc;
    use std::time::Duration;

    use sandpane::error::ExecError;
    use sandpane::exec::CommandGateway;
    use sandpane::extract::extract;
    use sandpane::safety::{PrefixAllowlist, TokenAllowlist};

    #[tokio::test]
    async fn test_command_from_reply_runs_in_working_dir() {
        let dir = tempfile::tempdir().unwrap();
        let gateway = CommandGateway::default().with_working_dir(dir.path());

        let segs = extract("```bash\n$ mkdir demo\n```");
        let request = segs[0].execution_request().unwrap();
        gateway.execute(&request.payload).await.unwrap();

        assert!(dir.path().join("demo").is_dir());
    }

    #[tokio::test]
    async fn test_disallowed_command_never_runs() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("marker");
        std::fs::write(&marker, "x").unwrap();

        let gateway = CommandGateway::default().with_working_dir(dir.path());
        let err = gateway.execute("rm marker").await.unwrap_err();
        assert!(err.is_rejection());
        assert!(marker.exists());
    }

    #[tokio::test]
    async fn test_token_policy_blocks_chained_commands() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("marker");
        std::fs::write(&marker, "x").unwrap();

        let prefix = CommandGateway::new(Arc::new(PrefixAllowlist::default()));
        assert!(prefix.policy().is_allowed("ls; rm marker"));

        let strict = CommandGateway::new(Arc::new(TokenAllowlist::default()))
            .with_working_dir(dir.path());
        let err = strict.execute("ls; rm marker").await.unwrap_err();
        assert!(matches!(err, ExecError::RejectedCommand { .. }));
        assert!(marker.exists());
    }

    #[tokio::test]
    async fn test_hanging_command_times_out() {
        let gateway = CommandGateway::new(Arc::new(PrefixAllowlist::new(["sleep"])))
            .with_timeout(Duration::from_millis(200));
        let started = std::time::Instant::now();
        let err = gateway.execute("sleep 30").await.unwrap_err();
        assert!(matches!(err, ExecError::Timeout(_)));
        assert!(started.elapsed() < Duration::from_secs(10));
    }
}

// ============================================================================
// 3. Running a script
// ============================================================================
#[cfg(unix)]
mod running_a_script {
    use sandpane::error::ExecError;
    use sandpane::exec::{Interpreter, ScriptRunner};

    fn runner(root: &std::path::Path) -> ScriptRunner {
        ScriptRunner::new(Interpreter::new("sh", "script.sh")).with_temp_root(root)
    }

    #[tokio::test]
    async fn test_script_output_and_cleanup() {
        let root = tempfile::tempdir().unwrap();
        let result = runner(root.path())
            .run("echo one\necho two")
            .await
            .unwrap();
        assert_eq!(result.stdout, "one\ntwo\n");
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_script_files_do_not_leak_between_runs() {
        let root = tempfile::tempdir().unwrap();
        let r = runner(root.path());
        r.run("echo data > left.txt").await.unwrap();
        let err = r.run("cat left.txt").await.unwrap_err();
        assert!(matches!(err, ExecError::ScriptError { .. }));
    }

    #[tokio::test]
    async fn test_many_concurrent_scripts() {
        let root = tempfile::tempdir().unwrap();
        let r = runner(root.path());
        let runs = (0..8).map(|i| {
            let r = r.clone();
            async move { r.run(&format!("echo {}", i)).await }
        });
        let results = spawn_all(runs).await;
        for (i, result) in results.into_iter().enumerate() {
            assert_eq!(result.unwrap().stdout, format!("{}\n", i));
        }
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }

    async fn spawn_all<F, T>(futures: impl Iterator<Item = F>) -> Vec<T>
    where
        F: std::future::Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let handles: Vec<_> = futures.map(tokio::spawn).collect();
        let mut out = Vec::new();
        for handle in handles {
            out.push(handle.await.unwrap());
        }
        out
    }
}

// ============================================================================
// 4. Previewing a snippet
// ============================================================================
mod previewing_a_snippet {
    use std::sync::Arc;
    use std::time::Duration;

    use serde_json::json;

    use sandpane::extract::extract;
    use sandpane::preview::{
        DependencyMap, FileSet, FrameRegistry, PreviewHost, PreviewState, compose,
    };

    #[test]
    fn test_compose_is_deterministic_and_self_contained() {
        let files = FileSet {
            html: Some("<div id=\"root\"></div>".to_string()),
            css: Some("#root { color: red }".to_string()),
            js: Some("document.getElementById('root').textContent = 'hi';".to_string()),
        };
        let deps: DependencyMap = [("confetti".to_string(), "1.9.0".to_string())]
            .into_iter()
            .collect();

        let a = compose(&files, &deps);
        let b = compose(&files, &deps);
        assert_eq!(a, b);
        assert!(a.as_str().contains("https://cdn.jsdelivr.net/npm/confetti@1.9.0"));
        assert!(a.as_str().contains("<style>#root { color: red }</style>"));
    }

    #[tokio::test]
    async fn test_preview_lifecycle_from_reply() {
        let segs = extract("```html\n<button>Click</button>\n```");
        let files = segs[0].preview_files().unwrap();

        let registry = FrameRegistry::new();
        let host = PreviewHost::new(Arc::new(registry.clone()));
        let mut states = host.subscribe();

        let id = host.refresh(files, DependencyMap::new()).await;
        let ready = tokio::time::timeout(
            Duration::from_secs(5),
            states.wait_for(|s| matches!(s, PreviewState::Ready { .. })),
        )
        .await
        .unwrap()
        .unwrap()
        .clone();
        assert_eq!(
            ready,
            PreviewState::Ready {
                generation: 1,
                frame_id: id
            }
        );

        let frame = registry.get(id).await.unwrap();
        assert!(frame.document.as_str().contains("<button>Click</button>"));

        assert!(
            host.handle_message(id, &json!({"type": "resize", "height": 640}))
                .await
        );
        assert_eq!(host.height().await, 640);

        host.teardown().await;
        assert_eq!(host.state(), PreviewState::Idle);
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_rapid_edits_settle_on_last_version() {
        let registry = FrameRegistry::new();
        let host = PreviewHost::new(Arc::new(registry.clone()));

        let mut last = None;
        for i in 0..5 {
            let files = FileSet {
                js: Some(format!("render({})", i)),
                ..FileSet::default()
            };
            last = Some(host.refresh(files, DependencyMap::new()).await);
        }
        let last = last.unwrap();

        let mut states = host.subscribe();
        tokio::time::timeout(
            Duration::from_secs(5),
            states.wait_for(|s| matches!(s, PreviewState::Ready { frame_id, .. } if *frame_id == last)),
        )
        .await
        .unwrap()
        .unwrap();

        assert_eq!(registry.len().await, 1);
        let frame = registry.get(last).await.unwrap();
        assert!(frame.document.as_str().contains("render(4)"));
    }
}
