//! Counter scenario: mount a component tree, click through its handler, and
//! verify the update mutates the existing host nodes instead of rebuilding
//! them.

use spark_fiber::{Engine, MemoryHost, PropValue, VNode, component};

#[test]
fn counter_mounts_and_updates_in_place() {
    let host = MemoryHost::new();
    let container = host.create_root();
    let mut engine = Engine::new(host.clone());

    let counter = component(|ctx, _props| {
        let (count, set_count) = ctx.use_state(0i64);
        VNode::host(
            "div",
            vec![],
            vec![
                VNode::host("span", vec![], vec![count.into()]).into(),
                VNode::host(
                    "button",
                    vec![(
                        "onClick",
                        PropValue::handler(move |engine| {
                            set_count.update(engine, |c| c + 1);
                        }),
                    )],
                    vec![],
                )
                .into(),
            ],
        )
    });

    engine.render(
        VNode::host(
            "div",
            vec![],
            vec![VNode::component(counter, vec![], vec![]).into()],
        ),
        container,
    );
    engine.run_to_idle().unwrap();

    let outer = host.children(container)[0];
    let inner = host.children(outer)[0];
    let span = host.children(inner)[0];
    let button = host.children(inner)[1];

    assert_eq!(host.tag(outer).as_deref(), Some("div"));
    assert_eq!(host.tag(span).as_deref(), Some("span"));
    assert_eq!(host.tag(button).as_deref(), Some("button"));

    let text = host.children(span)[0];
    assert_eq!(host.text(text).as_deref(), Some("0"));

    // Simulated click: the handler enqueues an increment and schedules a
    // scoped update.
    host.clear_ops();
    assert!(host.dispatch(&mut engine, button, "click"));
    assert!(!engine.is_idle());
    engine.run_to_idle().unwrap();

    // Same span, same text node; only the value was rewritten.
    assert_eq!(host.children(inner)[0], span);
    assert_eq!(host.children(span)[0], text);
    assert_eq!(host.text(text).as_deref(), Some("1"));

    // The whole update ran without creating, removing, or re-appending any
    // host node.
    let ops = host.ops();
    assert!(
        ops.iter().all(|op| {
            !op.starts_with("create") && !op.starts_with("remove") && !op.starts_with("append")
        }),
        "unexpected structural ops: {:?}",
        ops
    );

    // The re-registered handler keeps working.
    assert!(host.dispatch(&mut engine, button, "click"));
    engine.run_to_idle().unwrap();
    assert_eq!(host.text(text).as_deref(), Some("2"));
}

#[test]
fn conditional_type_flip_deletes_before_inserting() {
    let host = MemoryHost::new();
    let container = host.create_root();
    let mut engine = Engine::new(host.clone());

    // Drive the flip through two root renders; the positions line up, the
    // types do not.
    engine.render(
        VNode::host("div", vec![], vec![VNode::host("a", vec![], vec![]).into()]),
        container,
    );
    engine.run_to_idle().unwrap();
    let div = host.children(container)[0];
    let a = host.children(div)[0];

    host.clear_ops();
    engine.render(
        VNode::host("div", vec![], vec![VNode::host("b", vec![], vec![]).into()]),
        container,
    );
    engine.run_to_idle().unwrap();

    let b = host.children(div)[0];
    assert!(!host.contains(a));
    assert_eq!(host.tag(b).as_deref(), Some("b"));

    // The old node leaves the tree before the new one enters it.
    let ops = host.ops();
    let removed = ops
        .iter()
        .position(|op| *op == format!("remove #{}", a.raw()))
        .expect("old node removed");
    let appended = ops
        .iter()
        .position(|op| *op == format!("append #{} -> #{}", b.raw(), div.raw()))
        .expect("new node appended");
    assert!(removed < appended);
}
