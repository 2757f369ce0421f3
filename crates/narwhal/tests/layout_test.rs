use narwhal::graph::{FIXED_DRAG, FIXED_HOVER};
use narwhal::{
    Axis, Constraint, DragTarget, Drive, Error, EventKind, Group, Layout, LayoutOptions,
    LayoutState, Link, Node, Point, Rectangle, StartOptions,
};
use std::cell::RefCell;
use std::rc::Rc;

fn distance(a: &Node, b: &Node) -> f64 {
    a.position().distance_to(b.position())
}

fn path_links(n: usize) -> Vec<Link> {
    (1..n).map(|i| Link::new(i - 1, i)).collect()
}

fn external(layout: Layout) -> Layout {
    let mut layout = layout;
    layout.options_mut().drive = Drive::External;
    layout
}

fn record_events(layout: &mut Layout) -> Rc<RefCell<Vec<EventKind>>> {
    let events = Rc::new(RefCell::new(Vec::new()));
    for kind in [EventKind::Start, EventKind::Tick, EventKind::End] {
        let events = Rc::clone(&events);
        layout.on(kind, move |e| events.borrow_mut().push(e.kind));
    }
    events
}

#[test]
fn path_graph_settles_at_its_graph_distances() {
    let mut layout = Layout::new()
        .with_links(path_links(3))
        .link_distance(1.0)
        .convergence_threshold(1e-6);
    layout
        .start(StartOptions::iterations(50, 0, 0))
        .expect("start");

    let v = layout.nodes();
    assert_eq!(v.len(), 3, "nodes are created from links");
    assert!((distance(&v[0], &v[1]) - 1.0).abs() < 0.05);
    assert!((distance(&v[1], &v[2]) - 1.0).abs() < 0.05);
    assert!((distance(&v[0], &v[2]) - 2.0).abs() < 0.05);
    assert_eq!(layout.state(), LayoutState::Converged);
    assert_eq!(layout.alpha(), 0.0);
}

#[test]
fn pinned_node_stays_exactly_at_its_lock() {
    let nodes = vec![
        Node::at(50.0, 50.0).pinned(),
        Node::at(0.0, 0.0),
        Node::at(100.0, 0.0),
    ];
    let mut layout = Layout::new()
        .with_nodes(nodes)
        .with_links(path_links(3))
        .size(100.0, 100.0);
    layout
        .start(StartOptions::iterations(10, 0, 0))
        .expect("start");

    let v = &layout.nodes()[0];
    assert_eq!((v.x, v.y), (50.0, 50.0));
    assert_eq!(v.locked, Some(Point::new(50.0, 50.0)));
}

#[test]
fn disconnected_components_are_packed_apart_inside_the_canvas() {
    let nodes = (0..4).map(|_| Node::new().with_size(10.0, 10.0)).collect();
    let mut layout = Layout::new()
        .with_nodes(nodes)
        .with_links(vec![Link::new(0, 1), Link::new(2, 3)])
        .link_distance(30.0)
        .size(500.0, 500.0);
    layout
        .start(StartOptions {
            keep_running: false,
            ..StartOptions::iterations(50, 0, 0)
        })
        .expect("start");
    assert_eq!(layout.state(), LayoutState::Stopped);

    let v = layout.nodes();
    let bounds = |a: usize, b: usize| v[a].bounds.union(&v[b].bounds);
    let (first, second) = (bounds(0, 1), bounds(2, 3));
    let apart = first.max_x <= second.min_x
        || second.max_x <= first.min_x
        || first.max_y <= second.min_y
        || second.max_y <= first.min_y;
    assert!(apart, "{first:?} {second:?}");
    for n in v {
        assert!((0.0..=500.0).contains(&n.x) && (0.0..=500.0).contains(&n.y));
    }
}

#[test]
fn avoid_overlaps_keeps_node_boxes_apart() {
    let nodes = vec![
        Node::at(0.0, 0.0).with_size(20.0, 20.0),
        Node::at(1.0, 1.0).with_size(20.0, 20.0),
    ];
    let mut layout = Layout::new()
        .with_nodes(nodes)
        .with_links(vec![Link::new(0, 1)])
        .link_distance(5.0)
        .avoid_overlaps(true);
    layout
        .start(StartOptions::iterations(10, 10, 10))
        .expect("start");

    let v = layout.nodes();
    let dx = (v[0].x - v[1].x).abs();
    let dy = (v[0].y - v[1].y).abs();
    assert!(dx >= 19.0 || dy >= 19.0, "dx={dx} dy={dy}");
}

#[test]
fn separation_constraints_hold_after_the_run() {
    let mut layout = Layout::new()
        .with_links(path_links(3))
        .with_constraints(vec![
            Constraint::separation(Axis::X, 0, 1, 40.0),
            Constraint::separation(Axis::X, 1, 2, 40.0),
        ])
        .link_distance(10.0);
    layout
        .start(StartOptions::iterations(10, 20, 20))
        .expect("start");

    let v = layout.nodes();
    assert!(v[1].x - v[0].x >= 40.0 - 0.5, "{} {}", v[0].x, v[1].x);
    assert!(v[2].x - v[1].x >= 40.0 - 0.5, "{} {}", v[1].x, v[2].x);
}

#[test]
fn blocking_run_emits_start_ticks_then_end() {
    let mut layout = Layout::new().with_links(path_links(4));
    let events = record_events(&mut layout);
    layout
        .start(StartOptions::iterations(10, 0, 0))
        .expect("start");

    let events = events.borrow();
    assert_eq!(events.first(), Some(&EventKind::Start));
    assert_eq!(events.last(), Some(&EventKind::End));
    assert!(events.contains(&EventKind::Tick));
    assert_eq!(
        events.iter().filter(|&&k| k == EventKind::End).count(),
        1
    );
    assert_eq!(layout.state(), LayoutState::Converged);
}

#[test]
fn kick_stops_at_the_tick_limit() {
    let mut layout = Layout::new().with_links(path_links(4));
    layout.options_mut().max_kick_ticks = 2;
    layout.options_mut().convergence_threshold = 0.0;
    let events = record_events(&mut layout);
    layout.start(StartOptions::default()).expect("start");

    assert_eq!(layout.state(), LayoutState::Stopped);
    assert_eq!(layout.alpha(), 0.0);
    let ticks = events
        .borrow()
        .iter()
        .filter(|&&k| k == EventKind::Tick)
        .count();
    assert_eq!(ticks, 2);
    assert_eq!(events.borrow().last(), Some(&EventKind::End));
}

#[test]
fn externally_driven_layout_converges_tick_by_tick() {
    let mut layout = external(Layout::new().with_links(path_links(3)));
    let events = record_events(&mut layout);
    layout
        .start(StartOptions::iterations(10, 0, 0))
        .expect("start");
    assert_eq!(layout.state(), LayoutState::Running);
    assert_eq!(layout.alpha(), 0.1);
    assert_eq!(*events.borrow(), vec![EventKind::Start]);

    let mut ticks = 0;
    while !layout.tick().expect("tick") {
        ticks += 1;
        assert!(ticks < 10_000, "did not converge");
    }
    assert_eq!(layout.state(), LayoutState::Converged);
    assert!(layout.last_stress().is_some());
}

#[test]
fn first_tick_keeps_alpha_and_later_ticks_report_stress() {
    let mut layout = external(Layout::new().with_links(path_links(3)));
    layout.start(StartOptions::default()).expect("start");

    assert!(!layout.tick().expect("first tick"));
    assert_eq!(layout.alpha(), 0.1);
    let first = layout.last_stress();
    assert!(first.is_some());

    if !layout.tick().expect("second tick") {
        assert_eq!(Some(layout.alpha()), layout.last_stress());
    }
}

#[test]
fn stop_ends_the_run_on_the_next_tick() {
    let mut layout = external(Layout::new().with_links(path_links(3)));
    let events = record_events(&mut layout);
    layout.start(StartOptions::default()).expect("start");

    layout.stop().expect("stop");
    assert_eq!(layout.alpha(), 0.0);
    assert_eq!(layout.state(), LayoutState::Stopped);
    assert!(layout.tick().expect("tick"));
    assert_eq!(events.borrow().last(), Some(&EventKind::End));
}

#[test]
fn resume_restarts_a_converged_layout() {
    let mut layout = Layout::new().with_links(path_links(3));
    let events = record_events(&mut layout);
    layout.start(StartOptions::default()).expect("start");
    assert_eq!(layout.state(), LayoutState::Converged);

    layout.resume().expect("resume");
    assert_eq!(layout.state(), LayoutState::Converged);
    let starts = events
        .borrow()
        .iter()
        .filter(|&&k| k == EventKind::Start)
        .count();
    assert_eq!(starts, 2);
}

#[test]
fn alpha_setter_only_lowers_or_raises_while_running() {
    let mut layout = external(Layout::new().with_links(path_links(3)));
    layout.start(StartOptions::default()).expect("start");
    layout.set_alpha(0.5).expect("raise");
    assert_eq!(layout.alpha(), 0.5);
    layout.set_alpha(-1.0).expect("stop");
    assert_eq!(layout.alpha(), 0.0);
}

#[test]
fn ticking_before_start_is_an_error() {
    let mut layout = Layout::new().with_links(path_links(2));
    assert!(matches!(layout.tick(), Err(Error::NotStarted)));
    assert!(matches!(layout.resume(), Err(Error::NotStarted)));
}

#[test]
fn structural_errors_are_reported_before_anything_runs() {
    let err = Layout::new()
        .with_nodes(vec![Node::new(), Node::new()])
        .with_links(vec![Link::new(0, 5)])
        .start(StartOptions::default())
        .expect_err("missing node");
    assert!(matches!(err, Error::MissingNode { link: 0, index: 5 }));

    let err = Layout::new()
        .with_nodes(vec![Node::new()])
        .with_groups(vec![Group::new(vec![0, 3], Vec::new())])
        .start(StartOptions::default())
        .expect_err("missing member");
    assert!(matches!(err, Error::MissingGroupMember { group: 0, index: 3 }));

    let err = Layout::new()
        .with_nodes(vec![Node::new()])
        .with_groups(vec![Group::new(Vec::new(), vec![7])])
        .start(StartOptions::default())
        .expect_err("missing group");
    assert!(matches!(err, Error::MissingGroup { group: 0, index: 7 }));

    let err = Layout::new()
        .with_nodes(vec![Node::new()])
        .with_groups(vec![
            Group::new(Vec::new(), vec![1]),
            Group::new(Vec::new(), vec![0]),
        ])
        .start(StartOptions::default())
        .expect_err("cycle");
    assert!(matches!(err, Error::GroupCycle { .. }));

    let err = Layout::new()
        .with_nodes(vec![Node::new()])
        .with_groups(vec![
            Group::new(vec![0], Vec::new()),
            Group::new(vec![0], Vec::new()),
        ])
        .start(StartOptions::default())
        .expect_err("two parents");
    assert!(matches!(err, Error::GroupHasMultipleParents { index: 0 }));

    let err = Layout::new()
        .with_nodes(vec![Node::new()])
        .with_constraints(vec![Constraint::separation(Axis::Y, 0, 9, 1.0)])
        .start(StartOptions::default())
        .expect_err("constraint node");
    assert!(matches!(err, Error::ConstraintNode { index: 9 }));

    let err = Layout::with_options(LayoutOptions {
        distance_matrix: Some(vec![vec![0.0, 1.0]]),
        ..LayoutOptions::default()
    })
    .with_nodes(vec![Node::new(), Node::new()])
    .start(StartOptions::default())
    .expect_err("matrix shape");
    assert!(matches!(
        err,
        Error::DistanceMatrixShape {
            expected: 2,
            rows: 1
        }
    ));
}

#[test]
fn explicit_distance_matrix_replaces_shortest_paths() {
    let layout_options = LayoutOptions {
        distance_matrix: Some(vec![
            vec![0.0, 3.0, 4.0],
            vec![3.0, 0.0, 5.0],
            vec![4.0, 5.0, 0.0],
        ]),
        convergence_threshold: 1e-6,
        ..LayoutOptions::default()
    };
    let mut layout = Layout::with_options(layout_options)
        .with_nodes(vec![Node::at(0.0, 0.0), Node::at(1.0, 0.0), Node::at(0.0, 1.0)]);
    layout
        .start(StartOptions::iterations(100, 0, 0))
        .expect("start");

    let v = layout.nodes();
    assert!((distance(&v[0], &v[1]) - 3.0).abs() < 0.05);
    assert!((distance(&v[0], &v[2]) - 4.0).abs() < 0.05);
    assert!((distance(&v[1], &v[2]) - 5.0).abs() < 0.05);
}

#[test]
fn group_bounds_enclose_their_members() {
    let nodes = (0..4).map(|_| Node::new().with_size(10.0, 10.0)).collect();
    let mut layout = Layout::new()
        .with_nodes(nodes)
        .with_links(path_links(4))
        .with_groups(vec![Group::new(vec![0, 1], Vec::new()).with_padding(4.0)])
        .avoid_overlaps(true)
        .size(200.0, 200.0);
    layout
        .start(StartOptions::iterations(10, 10, 10))
        .expect("start");

    let root = layout.root_group().expect("root group");
    assert_eq!(root.leaves, vec![2, 3]);
    assert_eq!(root.groups, vec![0]);
    assert_eq!(layout.nodes()[0].parent, Some(0));

    let g = layout.groups()[0].bounds;
    for v in &layout.nodes()[..2] {
        let b = v.bounds;
        assert!(g.min_x <= b.min_x && b.max_x <= g.max_x, "{g:?} {b:?}");
        assert!(g.min_y <= b.min_y && b.max_y <= g.max_y, "{g:?} {b:?}");
    }
}

#[test]
fn dragging_a_node_pins_it_to_the_pointer() {
    let mut layout = external(Layout::new().with_links(path_links(3)));
    layout
        .start(StartOptions::iterations(10, 0, 0))
        .expect("start");

    layout.drag_start(DragTarget::Node(0));
    assert_eq!(layout.nodes()[0].fixed & FIXED_DRAG, FIXED_DRAG);
    layout.drag(DragTarget::Node(0), Point::new(100.0, -20.0));
    layout.resume().expect("resume");
    assert!(!layout.tick().expect("tick"));
    assert_eq!((layout.nodes()[0].x, layout.nodes()[0].y), (100.0, -20.0));

    layout.drag_end(DragTarget::Node(0));
    assert_eq!(layout.nodes()[0].fixed, 0);
}

#[test]
fn dragging_a_group_moves_its_leaves_rigidly() {
    let nodes = vec![Node::at(0.0, 0.0), Node::at(10.0, 0.0), Node::at(50.0, 50.0)];
    let mut layout = external(
        Layout::new()
            .with_nodes(nodes)
            .with_links(path_links(3))
            .with_groups(vec![Group::new(vec![0, 1], Vec::new())]),
    );
    layout.start(StartOptions::default()).expect("start");

    let before = layout.nodes()[1].x - layout.nodes()[0].x;
    layout.drag_start(DragTarget::Group(0));
    layout.drag(DragTarget::Group(0), Point::new(300.0, 300.0));
    layout.tick().expect("tick");
    let after = layout.nodes()[1].x - layout.nodes()[0].x;
    assert!((before - after).abs() < 1e-9);
    let mid = Point::new(
        (layout.nodes()[0].x + layout.nodes()[1].x) / 2.0,
        (layout.nodes()[0].y + layout.nodes()[1].y) / 2.0,
    );
    assert!(mid.distance_to(Point::new(300.0, 300.0)) < 1e-6, "{mid:?}");

    layout.drag_end(DragTarget::Group(0));
    assert!(layout.nodes()[..2].iter().all(|v| v.fixed == 0 && v.drag_offset.is_none()));
}

#[test]
fn hovering_pins_a_node_until_the_pointer_leaves() {
    let mut layout = Layout::new().with_links(path_links(2));
    layout.mouse_over(0);
    assert_eq!(layout.nodes().len(), 0, "hover on a missing node is ignored");

    let mut layout = Layout::new().with_nodes(vec![Node::at(3.0, 4.0)]);
    layout.mouse_over(0);
    assert_eq!(layout.nodes()[0].fixed, FIXED_HOVER);
    assert_eq!(layout.nodes()[0].locked, Some(Point::new(3.0, 4.0)));
    layout.mouse_out(0);
    assert_eq!(layout.nodes()[0].fixed, 0);
}

fn routing_layout(nodes: Vec<Node>, links: Vec<Link>) -> Layout {
    let mut layout = Layout::new()
        .with_nodes(nodes)
        .with_links(links)
        .handle_disconnected(false);
    layout
        .start(StartOptions {
            keep_running: false,
            ..StartOptions::default()
        })
        .expect("start");
    layout
}

#[test]
fn routed_edge_bends_around_a_node_in_the_way() {
    let nodes = vec![
        Node::at(0.0, 0.0).with_size(20.0, 20.0),
        Node::at(100.0, 0.0).with_size(20.0, 20.0),
        Node::at(50.0, 0.0).with_size(20.0, 20.0),
    ];
    let mut layout = routing_layout(nodes, vec![Link::new(0, 1)]);
    assert!(matches!(layout.route_edge(0, 0.0), Err(Error::RoutingNotPrepared)));

    layout.prepare_edge_routing(2.0);
    let route = layout.route_edge(0, 0.0).expect("route");
    assert_eq!(route.len(), 4, "{route:?}");
    assert!((route[0].x - 8.0).abs() < 1e-9, "{route:?}");
    assert!((route[1].x - 42.0).abs() < 1e-9 && (route[2].x - 58.0).abs() < 1e-9);
    assert!((route[1].y.abs() - 8.0).abs() < 1e-9 && route[1].y == route[2].y);
    assert!((route[3].x - 92.0).abs() < 1e-9, "{route:?}");

    assert!(matches!(layout.route_edge(3, 0.0), Err(Error::MissingLink { index: 3 })));
}

#[test]
fn unobstructed_edge_is_a_straight_segment_short_of_the_arrow() {
    let nodes = vec![
        Node::at(0.0, 0.0).with_size(20.0, 20.0),
        Node::at(100.0, 0.0).with_size(20.0, 20.0),
    ];
    let mut layout = routing_layout(nodes, vec![Link::new(0, 1)]);
    layout.prepare_edge_routing(2.0);
    let route = layout.route_edge(0, 5.0).expect("route");
    assert_eq!(route.len(), 2);
    assert!(route[0].distance_to(Point::new(8.0, 0.0)) < 1e-9, "{route:?}");
    assert!(route[1].distance_to(Point::new(87.0, 0.0)) < 1e-9, "{route:?}");
}

#[test]
fn power_graph_groups_replace_the_layout_groups() {
    let links = [(0, 2), (0, 3), (0, 4), (1, 2), (1, 3), (1, 4)]
        .into_iter()
        .map(|(s, t)| Link::new(s, t))
        .collect();
    let mut layout = Layout::new().with_links(links);
    let pg = layout.power_graph_groups().expect("power graph");

    assert_eq!(layout.groups().len(), 2);
    assert_eq!(pg.power_edges.len(), 1);
    let mut leaves: Vec<Vec<usize>> = layout
        .groups()
        .iter()
        .map(|g| {
            let mut l = g.leaves.clone();
            l.sort_unstable();
            l
        })
        .collect();
    leaves.sort();
    assert_eq!(leaves, vec![vec![0, 1], vec![2, 3, 4]]);
    let root = layout.root_group().expect("root");
    assert!(root.leaves.is_empty());
    assert_eq!(root.groups, vec![0, 1]);
}

#[test]
fn link_ids_name_both_ends() {
    assert_eq!(Layout::link_id(&Link::new(3, 7)), "3-7");
}

#[test]
fn options_deserialize_with_defaults() {
    let opts: LayoutOptions = serde_json::from_str(
        r#"{"avoidOverlaps":true,"canvasSize":[800,600],"linkLengths":{"kind":"jaccard","ideal":30,"weight":0.7}}"#,
    )
    .expect("options");
    assert!(opts.avoid_overlaps);
    assert_eq!(opts.canvas_size, [800.0, 600.0]);
    assert_eq!(
        opts.link_lengths,
        narwhal::LinkLengths::Jaccard {
            ideal: 30.0,
            weight: 0.7
        }
    );
    assert_eq!(opts.link_distance, 20.0);
    assert!(opts.handle_disconnected);
}

#[test]
fn batch_entry_point_returns_positions_and_group_bounds() {
    let graph = narwhal::Graph {
        links: path_links(3),
        groups: vec![Group::new(vec![0, 1], Vec::new())],
        ..narwhal::Graph::default()
    };
    let result = narwhal::layout(graph, LayoutOptions::default(), StartOptions::iterations(5, 0, 5))
        .expect("layout");
    assert_eq!(result.nodes.len(), 3);
    assert_eq!(result.groups.len(), 1);
    assert!(result.stress.is_some());
    let g: Rectangle = result.groups[0];
    assert!(g.contains_point(result.nodes[0]) && g.contains_point(result.nodes[1]));
}

#[test]
fn grid_snap_puts_nodes_on_the_node_size_grid() {
    let nodes = vec![
        Node::at(3.0, 4.0).with_size(10.0, 10.0),
        Node::at(24.0, 2.0).with_size(10.0, 10.0),
        Node::at(47.0, 9.0).with_size(10.0, 10.0),
        Node::at(63.0, 21.0).with_size(10.0, 10.0),
    ];
    let mut layout = Layout::new()
        .with_nodes(nodes)
        .with_links(path_links(4))
        .link_distance(20.0)
        .handle_disconnected(false)
        .convergence_threshold(1e-6);
    layout
        .start(StartOptions {
            grid_snap_iterations: 50,
            keep_running: false,
            ..StartOptions::iterations(20, 0, 0)
        })
        .expect("start");

    let off_grid = |c: f64| (c - (c / 10.0).round() * 10.0).abs();
    for v in layout.nodes() {
        assert!(off_grid(v.x) < 1.0, "x={} is off the grid", v.x);
        assert!(off_grid(v.y) < 1.0, "y={} is off the grid", v.y);
    }
}

#[test]
fn nested_group_bounds_contain_child_groups_and_members() {
    let nodes = (0..6).map(|_| Node::new().with_size(10.0, 10.0)).collect();
    let groups = vec![
        Group::new(vec![0, 1], vec![1]).with_padding(6.0),
        Group::new(vec![2, 3], Vec::new()).with_padding(4.0),
    ];
    let mut layout = Layout::new()
        .with_nodes(nodes)
        .with_links(path_links(6))
        .with_groups(groups)
        .link_distance(30.0)
        .avoid_overlaps(true)
        .size(400.0, 400.0);
    layout
        .start(StartOptions::iterations(10, 10, 20))
        .expect("start");

    let root = layout.root_group().expect("root group");
    assert_eq!(root.groups, vec![0]);
    assert_eq!(root.leaves, vec![4, 5]);
    assert_eq!(layout.groups()[1].parent, Some(0));

    let inside = |inner: &Rectangle, outer: &Rectangle| {
        outer.min_x <= inner.min_x
            && inner.max_x <= outer.max_x
            && outer.min_y <= inner.min_y
            && inner.max_y <= outer.max_y
    };
    let (outer, inner) = (layout.groups()[0].bounds, layout.groups()[1].bounds);
    assert!(inside(&inner, &outer), "{inner:?} not in {outer:?}");
    for v in &layout.nodes()[..2] {
        assert!(inside(&v.bounds, &outer), "{:?} not in {outer:?}", v.bounds);
    }
    for v in &layout.nodes()[2..4] {
        assert!(inside(&v.bounds, &inner), "{:?} not in {inner:?}", v.bounds);
    }

    // Nodes outside the group end up clear of it, up to solver tolerance.
    let shrunk = outer.inflate(-1.0);
    for v in &layout.nodes()[4..] {
        let b = v.bounds;
        let clear = b.max_x <= shrunk.min_x
            || shrunk.max_x <= b.min_x
            || b.max_y <= shrunk.min_y
            || shrunk.max_y <= b.min_y;
        assert!(clear, "{b:?} overlaps group {outer:?}");
    }
}

#[test]
fn many_tightly_linked_nodes_end_up_pairwise_disjoint() {
    let n = 12;
    let nodes = (0..n).map(|_| Node::new().with_size(10.0, 10.0)).collect();
    let mut links = path_links(n);
    links.push(Link::new(n - 1, 0));
    links.push(Link::new(0, n / 2));
    let mut layout = Layout::new()
        .with_nodes(nodes)
        .with_links(links)
        .link_distance(5.0)
        .avoid_overlaps(true)
        .size(300.0, 300.0);
    layout
        .start(StartOptions::iterations(10, 10, 30))
        .expect("start");

    let rects: Vec<Rectangle> = layout.nodes().iter().map(|v| v.bounds.inflate(-0.5)).collect();
    for (i, a) in rects.iter().enumerate() {
        for (j, b) in rects.iter().enumerate().skip(i + 1) {
            let apart = a.max_x <= b.min_x
                || b.max_x <= a.min_x
                || a.max_y <= b.min_y
                || b.max_y <= a.min_y;
            assert!(apart, "nodes {i} and {j} overlap: {a:?} {b:?}");
        }
    }
}

#[test]
fn flow_layout_puts_every_target_below_its_source() {
    let links = vec![
        Link::new(0, 1),
        Link::new(0, 2),
        Link::new(1, 3),
        Link::new(2, 3),
        Link::new(3, 4),
    ];
    let mut layout = Layout::new()
        .with_links(links)
        .link_distance(20.0)
        .flow_layout(Axis::Y, 30.0)
        .size(300.0, 300.0);
    layout
        .start(StartOptions::iterations(10, 20, 20))
        .expect("start");

    let v = layout.nodes();
    for l in layout.links() {
        let (s, t) = (&v[l.source], &v[l.target]);
        assert!(t.y - s.y >= 30.0 - 1e-3, "{} -> {}: {} {}", l.source, l.target, s.y, t.y);
    }
}

#[test]
fn aligned_nodes_share_a_line_and_do_not_overlap() {
    let nodes = vec![
        Node::at(0.0, 0.0).with_size(10.0, 10.0),
        Node::at(1.0, 5.0).with_size(10.0, 10.0),
        Node::at(2.0, -5.0).with_size(10.0, 10.0),
    ];
    let mut layout = Layout::new()
        .with_nodes(nodes)
        .with_links(path_links(3))
        .with_constraints(vec![Constraint::alignment(Axis::Y, [0, 1, 2])])
        .link_distance(5.0)
        .avoid_overlaps(true);
    layout
        .start(StartOptions::iterations(10, 10, 20))
        .expect("start");

    let v = layout.nodes();
    for w in &v[1..] {
        assert!((w.y - v[0].y).abs() < 1e-3, "{} vs {}", w.y, v[0].y);
    }
    for i in 0..3 {
        for j in (i + 1)..3 {
            let dx = (v[i].x - v[j].x).abs();
            assert!(dx >= 10.0 - 0.5, "nodes {i} and {j} are {dx} apart");
        }
    }
}

#[test]
fn a_failing_tick_stops_the_layout() {
    let mut layout = Layout::new()
        .with_links(path_links(2))
        .with_constraints(vec![
            Constraint::equality(Axis::X, 0, 1, 5.0),
            Constraint::equality(Axis::X, 1, 0, 5.0),
        ]);
    let events = record_events(&mut layout);
    layout
        .start(StartOptions {
            keep_running: false,
            ..StartOptions::default()
        })
        .expect("start runs no projected step");

    let err = layout.resume().expect_err("contradictory equalities");
    assert!(matches!(err, Error::Unsatisfiable { .. }));
    assert_eq!(layout.state(), LayoutState::Stopped);
    assert_eq!(layout.alpha(), 0.0);
    assert_eq!(events.borrow().as_slice(), &[EventKind::Start]);
}
