#[cfg(test)]
mod tests {
    use ember_middle::analysis::cfg::ControlFlowGraph;
    use ember_middle::analysis::liveness::{LiveSet, Liveness};
    use ember_middle::ir::lir::LIR;

    use crate::common::build_lir;


    const PROGRAM: &str = r#"
    fx mix(a: int, b: int, c: int) -> int {
        let d = a * b
        let e = d - c
        return e + a
    }
    let x = mix(1, 2, 3)
    let y = x % 4
    print(y)
    print("end")
    "#;

    fn analyse(lir: &LIR, name: &str) -> (ControlFlowGraph, Liveness) {
        let function = lir.function_by_name(name).unwrap();
        let cfg = ControlFlowGraph::build(lir, function).unwrap();
        let liveness = Liveness::compute(lir, function, &cfg).unwrap();
        (cfg, liveness)
    }

    #[test]
    fn converges_within_the_iteration_bound() {
        let lir = build_lir(PROGRAM);

        for function in lir.functions.iter() {
            let (cfg, liveness) = analyse(&lir, &function.name);
            assert!(liveness.iterations >= cfg.len());
            assert!(liveness.iterations <= cfg.len() * (function.variable_count + 1), "`{}` took {} iterations", function.name, liveness.iterations);
        }
    }

    #[test]
    fn live_in_only_grows_between_visits() {
        let lir = build_lir(PROGRAM);

        for function in lir.functions.iter() {
            let (cfg, liveness) = analyse(&lir, &function.name);
            let mut last_seen = vec![LiveSet::new(); cfg.len()];
            for (position, live_in) in liveness.history.iter() {
                assert!(last_seen[*position].is_subset(live_in));
                last_seen[*position] = live_in.clone();
            }
            assert_eq!(last_seen, liveness.live_in);
        }
    }

    #[test]
    fn nothing_is_live_on_entry_to_main() {
        let lir = build_lir(PROGRAM);

        let (_, liveness) = analyse(&lir, "main");
        assert!(liveness.live_in[0].is_empty());
    }

    #[test]
    fn parameters_are_live_on_entry() {
        let lir = build_lir(PROGRAM);

        let (_, liveness) = analyse(&lir, "mix");
        assert_eq!(liveness.live_in[0], LiveSet::from([0, 1, 2]));
        assert!(liveness.live_out.iter().all(|live| live.is_empty()));
    }

    #[test]
    fn temporaries_die_at_their_last_use() {
        let lir = build_lir("let k = 1 + 2\nprint(k)");
        let function = lir.function_by_name("main").unwrap();

        let (_, liveness) = analyse(&lir, "main");
        let temporary = function.declared_count;
        let entry = &liveness.live_after[0];
        // declare t, mov t, add t, declare k, mov k, t
        assert!(entry[1].contains(&temporary));
        assert!(entry[2].contains(&temporary));
        assert!(!entry[4].contains(&temporary));
        assert!(entry[4].contains(&0));
    }
}
