use std::time::Duration;

use paste::paste;
use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::{
    formula::{Clause, Cnf},
    parser::parse_file,
    solver::{
        Budget, CdclConfig, CdclSolver, DpSolver, DpllSolver, ResolutionSolver, RestartStrategy,
        SolveResult, Solver,
    },
};

fn cdcl(formula: Cnf) -> SolveResult {
    CdclSolver::new(formula).solve().unwrap()
}

fn with_restart(formula: Cnf, restart: RestartStrategy) -> SolveResult {
    let config = CdclConfig {
        restart,
        ..Default::default()
    };
    CdclSolver::with_config(formula, config).solve().unwrap()
}

fn geometric(formula: Cnf) -> SolveResult {
    with_restart(
        formula,
        RestartStrategy::Geometric {
            first: 100,
            factor: 1.5,
        },
    )
}

fn no_restart(formula: Cnf) -> SolveResult {
    with_restart(formula, RestartStrategy::Never)
}

fn dpll(formula: Cnf) -> SolveResult {
    DpllSolver::new(formula).solve().unwrap()
}

fn dp(formula: Cnf) -> SolveResult {
    DpSolver::new(formula).solve().unwrap()
}

fn resolution(formula: Cnf) -> SolveResult {
    ResolutionSolver::new(formula).solve().unwrap()
}

macro_rules! sat_testcase_with_solver {
    ($solver:ident, $dir:ident, $name: ident) => {
        paste! {
            #[test]
            fn [< $solver _ $dir _ $name >]() {
                let formula = parse_file(
                    concat!("testcases/", stringify!($dir), "/", stringify!($name), ".cnf")
                ).unwrap();
                let result = $solver(formula);
                assert!(result.model().unwrap().is_satisfying());
            }
        }
    };
}

macro_rules! unsat_testcase_with_solver {
    ($solver:ident, $dir:ident, $name:ident) => {
        paste! {
            #[test]
            fn [< $solver _ $dir _ $name >]() {
                let formula = parse_file(
                    concat!("testcases/", stringify!($dir), "/", stringify!($name), ".cnf")
                ).unwrap();
                let result = $solver(formula);
                assert!(result.is_unsat());
            }
        }
    };
}

macro_rules! sat_testcase {
    ($dir:ident, $name:ident) => {
        sat_testcase_with_solver!(cdcl, $dir, $name);
        sat_testcase_with_solver!(geometric, $dir, $name);
        sat_testcase_with_solver!(no_restart, $dir, $name);
    };
}

macro_rules! unsat_testcase {
    ($dir:ident, $name:ident) => {
        unsat_testcase_with_solver!(cdcl, $dir, $name);
        unsat_testcase_with_solver!(geometric, $dir, $name);
        unsat_testcase_with_solver!(no_restart, $dir, $name);
    };
}

// DPLL explores the whole tree, keep it to the small instances
macro_rules! small_sat_testcase {
    ($dir:ident, $name:ident) => {
        sat_testcase!($dir, $name);
        sat_testcase_with_solver!(dpll, $dir, $name);
    };
}

macro_rules! small_unsat_testcase {
    ($dir:ident, $name:ident) => {
        unsat_testcase!($dir, $name);
        unsat_testcase_with_solver!(dpll, $dir, $name);
    };
}

// Resolution based procedures may blow up, only the tiny instances
macro_rules! tiny_sat_testcase {
    ($dir:ident, $name:ident) => {
        small_sat_testcase!($dir, $name);
        sat_testcase_with_solver!(dp, $dir, $name);
        sat_testcase_with_solver!(resolution, $dir, $name);
    };
}

macro_rules! tiny_unsat_testcase {
    ($dir:ident, $name:ident) => {
        small_unsat_testcase!($dir, $name);
        unsat_testcase_with_solver!(dp, $dir, $name);
        unsat_testcase_with_solver!(resolution, $dir, $name);
    };
}

tiny_sat_testcase!(basic, empty_formula);
tiny_unsat_testcase!(basic, empty_clause);
tiny_sat_testcase!(basic, triangle);
tiny_unsat_testcase!(basic, unit_conflict);
tiny_sat_testcase!(basic, unit_chain);
tiny_unsat_testcase!(basic, unit_chain_refuted);
tiny_sat_testcase!(basic, parity);
tiny_unsat_testcase!(basic, full3);
tiny_sat_testcase!(basic, tautologies);
tiny_sat_testcase!(basic, duplicates);
tiny_sat_testcase!(basic, unused_variables);

tiny_unsat_testcase!(pigeonhole, ph2);
small_unsat_testcase!(pigeonhole, ph3);
small_unsat_testcase!(pigeonhole, ph4);
unsat_testcase!(pigeonhole, ph5);
unsat_testcase!(pigeonhole, ph6);

small_unsat_testcase!(queens, queens3);
small_sat_testcase!(queens, queens4);
sat_testcase!(queens, queens8);

small_sat_testcase!(random, planted20);
sat_testcase!(random, planted50);
sat_testcase!(random, planted100);
sat_testcase!(random, planted200);
unsat_testcase!(random, unsat30);
unsat_testcase!(random, unsat35);
unsat_testcase!(random, unsat40);

#[test]
fn gzip_input() {
    let plain = parse_file("testcases/basic/triangle.cnf").unwrap();
    let compressed = parse_file("testcases/basic/triangle.cnf.gz").unwrap();
    assert_eq!(plain.clauses(), compressed.clauses());

    let model = cdcl(compressed);
    assert!(model.model().unwrap().is_satisfying());
}

#[test]
fn model_lists_every_variable() {
    let formula = parse_file("testcases/basic/unused_variables.cnf").unwrap();
    let result = cdcl(formula);
    let model = result.model().unwrap();

    let literals = model.dimacs_literals().collect::<Vec<_>>();
    assert_eq!(literals.len(), 8);
    assert_eq!(literals[1], 2);
    assert_eq!(literals[4], -5);
    assert!(model.to_string().ends_with(" 0"));
}

#[test]
fn conflict_budget_is_indeterminate() {
    let formula = parse_file("testcases/pigeonhole/ph6.cnf").unwrap();
    let config = CdclConfig {
        budget: Budget::unlimited().with_max_conflicts(10),
        ..Default::default()
    };
    let mut solver = CdclSolver::with_config(formula, config);

    assert!(matches!(
        solver.run().unwrap(),
        crate::solver::Verdict::Indeterminate
    ));
    assert!(solver.assignment().is_none());
}

#[test]
fn zero_timeout_is_indeterminate() {
    let budget = Budget::unlimited().with_timeout(Duration::from_secs(0));

    let formula = parse_file("testcases/pigeonhole/ph6.cnf").unwrap();
    let config = CdclConfig {
        budget,
        ..Default::default()
    };
    let result = CdclSolver::with_config(formula, config).solve().unwrap();
    assert!(matches!(result, SolveResult::Indeterminate));

    let formula = parse_file("testcases/pigeonhole/ph6.cnf").unwrap();
    let result = DpllSolver::with_budget(formula, budget).solve().unwrap();
    assert!(matches!(result, SolveResult::Indeterminate));

    let formula = parse_file("testcases/pigeonhole/ph6.cnf").unwrap();
    let result = DpSolver::with_budget(formula, budget).solve().unwrap();
    assert!(matches!(result, SolveResult::Indeterminate));

    let formula = parse_file("testcases/pigeonhole/ph6.cnf").unwrap();
    let result = ResolutionSolver::with_budget(formula, budget).solve().unwrap();
    assert!(matches!(result, SolveResult::Indeterminate));
}

#[test]
fn fixed_seed_reproduces_model() {
    let config = CdclConfig {
        random_var_freq: 0.2,
        seed: 42,
        ..Default::default()
    };
    let solve = || {
        let formula = parse_file("testcases/random/planted100.cnf").unwrap();
        match CdclSolver::with_config(formula, config.clone()).solve().unwrap() {
            SolveResult::Sat(model) => model.assignment().to_vec(),
            result => panic!("expected a model, got {:?}", result),
        }
    };

    assert_eq!(solve(), solve());
}

fn random_formula(rng: &mut StdRng, num_variables: usize, num_clauses: usize) -> Cnf {
    let mut formula = Cnf::new(num_variables);
    for _ in 0..num_clauses {
        let len = rng.gen_range(1..=4);
        let values = (0..len)
            .map(|_| {
                let id = rng.gen_range(1..=num_variables) as i64;
                if rng.gen() {
                    id
                } else {
                    -id
                }
            })
            .collect::<Vec<_>>();
        formula.add_clause(Clause::from_dimacs(&values));
    }
    formula
}

fn brute_force(formula: &Cnf) -> bool {
    let n = formula.num_variables();
    (0..1u32 << n).any(|bits| {
        let assignment = (0..n).map(|i| bits & (1 << i) != 0).collect::<Vec<_>>();
        formula
            .clauses()
            .iter()
            .all(|clause| clause.is_satisfied_by(&assignment))
    })
}

#[test]
fn agrees_with_exhaustive_search() {
    let mut rng = StdRng::seed_from_u64(0x5eed);

    for round in 0..300 {
        let num_variables = rng.gen_range(1..=10);
        let num_clauses = rng.gen_range(1..=5 * num_variables);
        let formula = random_formula(&mut rng, num_variables, num_clauses);
        let expected = brute_force(&formula);

        let mut results = vec![
            cdcl(formula.clone()),
            no_restart(formula.clone()),
            dpll(formula.clone()),
            dp(formula.clone()),
        ];
        // Saturation grows too fast beyond a handful of variables
        if num_variables <= 6 {
            results.push(resolution(formula.clone()));
        }

        for result in &results {
            match result {
                SolveResult::Sat(model) => {
                    assert!(expected, "round {}: spurious model", round);
                    assert!(model.is_satisfying(), "round {}: wrong model", round);
                }
                SolveResult::Unsat => assert!(!expected, "round {}: missed model", round),
                SolveResult::Indeterminate => panic!("round {}: gave up without a budget", round),
            }
        }
    }
}
