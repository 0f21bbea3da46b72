use dmpbbo_core::{DmpBboError, Parameterizable, Trajectory};
use dmpbbo_dmp::{Dmp, DmpConfig, DmpType, Rbfn};
use nalgebra::DVector;

fn linspace(from: f64, to: f64, n: usize) -> DVector<f64> {
    DVector::from_fn(n, |i, _| from + (to - from) * i as f64 / (n - 1) as f64)
}

fn min_jerk_demo() -> Trajectory {
    let ts = linspace(0.0, 1.0, 101);
    Trajectory::from_min_jerk(&ts, &DVector::zeros(1), &DVector::from_element(1, 1.0)).expect("min-jerk")
}

fn trained_dmp(config: DmpConfig) -> Dmp {
    Dmp::from_trajectory(&min_jerk_demo(), vec![Rbfn::new(25, 0.7)], config).expect("train dmp")
}

#[test]
fn analytical_solution_reproduces_demonstration() {
    let demo = min_jerk_demo();
    let dmp = trained_dmp(DmpConfig::default());

    let solution = dmp.analytical_solution(demo.ts()).expect("analytical solution");
    let reproduced = dmp
        .states_as_trajectory(demo.ts(), &solution.xs, &solution.xds)
        .expect("states as trajectory");

    let pos_err = (reproduced.ys() - demo.ys()).amax();
    assert!(pos_err < 5e-3, "position reproduction error {}", pos_err);
    let vel_err = (reproduced.yds() - demo.yds()).amax();
    assert!(vel_err < 0.1, "velocity reproduction error {}", vel_err);
}

#[test]
fn euler_integration_converges_to_analytical_solution() {
    let dmp = trained_dmp(DmpConfig::default());

    let mut errors = Vec::new();
    for n in [31, 61, 121, 241] {
        let ts = linspace(0.0, 1.0, n);
        let analytical = dmp.analytical_solution(&ts).expect("analytical solution");
        let (xs, _) = dmp.integrate_steps(&ts).expect("euler integration");
        let err = (xs.column(0) - analytical.xs.column(0)).amax();
        errors.push(err);
    }

    for pair in errors.windows(2) {
        assert!(pair[1] < pair[0], "errors not decreasing: {:?}", errors);
    }
    assert!(errors[3] < 0.01, "fine-grid Euler error {:?}", errors);
}

#[test]
fn unperturbed_rollout_converges_to_goal() {
    let dmp = trained_dmp(DmpConfig::default());

    for duration in [1.0, 1.5] {
        let ts = linspace(0.0, duration, (100.0 * duration) as usize + 1);
        let solution = dmp.analytical_solution(&ts).expect("analytical solution");
        let traj = dmp
            .states_as_trajectory(&ts, &solution.xs, &solution.xds)
            .expect("states as trajectory");
        let y_end = traj.final_y()[0];
        let yd_end = traj.yds()[(traj.len() - 1, 0)];
        assert!((y_end - 1.0).abs() < 0.01, "final position {} at t={}", y_end, duration);
        assert!(yd_end.abs() < 0.01, "final velocity {} at t={}", yd_end, duration);
    }

    let ts = linspace(0.0, 1.5, 1501);
    let (xs, _) = dmp.integrate_steps(&ts).expect("euler integration");
    let y_end = xs[(ts.len() - 1, 0)];
    assert!((y_end - 1.0).abs() < 0.01, "Euler final position {}", y_end);
}

#[test]
fn acceleration_matches_velocity_derivative() {
    let dmp = trained_dmp(DmpConfig::default());
    let ts = linspace(0.0, 1.0, 1001);
    let solution = dmp.analytical_solution(&ts).expect("analytical solution");
    let traj = dmp
        .states_as_trajectory(&ts, &solution.xs, &solution.xds)
        .expect("states as trajectory");

    let h = ts[1] - ts[0];
    let mut max_err: f64 = 0.0;
    for i in 1..ts.len() - 1 {
        let fd = (traj.yds()[(i + 1, 0)] - traj.yds()[(i - 1, 0)]) / (2.0 * h);
        max_err = max_err.max((fd - traj.ydds()[(i, 0)]).abs());
    }
    assert!(max_err < 0.05, "acceleration deviates from d/dt velocity by {}", max_err);
}

#[test]
fn param_vector_round_trip_preserves_rollout() {
    let mut dmp = trained_dmp(DmpConfig::default());
    let ts = linspace(0.0, 1.0, 51);
    let before = dmp.analytical_solution(&ts).expect("before").xs;

    let values = dmp.param_vector().expect("param vector");
    assert_eq!(values.len(), dmp.param_vector_size());
    dmp.set_param_vector(&values).expect("set param vector");
    assert_eq!(dmp.param_vector().expect("param vector"), values);
    assert_eq!(dmp.analytical_solution(&ts).expect("after").xs, before);

    let err = dmp.set_param_vector(&DVector::zeros(values.len() + 1));
    assert!(matches!(err, Err(DmpBboError::DimensionMismatch { .. })));
}

#[test]
fn generalizes_to_new_goal_and_duration() {
    let mut dmp = trained_dmp(DmpConfig::default());
    dmp.set_y_attr(&DVector::from_element(1, 2.0)).expect("set goal");
    dmp.set_tau(2.0).expect("set tau");

    let ts = linspace(0.0, 3.0, 301);
    let solution = dmp.analytical_solution(&ts).expect("analytical solution");
    let y_end = solution.xs[(ts.len() - 1, 0)];
    assert!((y_end - 2.0).abs() < 0.05, "final position {}", y_end);

    assert!(matches!(dmp.set_tau(-1.0), Err(DmpBboError::InvalidInput(_))));
}

#[test]
fn all_formulations_reach_the_goal() {
    for dmp_type in [
        DmpType::Kulvicius2012Joining,
        DmpType::Countdown2013,
        DmpType::Ijspeert2002Movement,
    ] {
        let dmp = trained_dmp(DmpConfig {
            dmp_type,
            ..DmpConfig::default()
        });
        let ts = linspace(0.0, 1.5, 151);
        let solution = dmp.analytical_solution(&ts).expect("analytical solution");
        let y_end = solution.xs[(ts.len() - 1, 0)];
        assert!((y_end - 1.0).abs() < 0.05, "{:?}: final position {}", dmp_type, y_end);
    }
}

#[test]
fn training_rejects_wrong_dimensionality() {
    let mut dmp = trained_dmp(DmpConfig::default());
    let ts = linspace(0.0, 1.0, 11);
    let demo_2d = Trajectory::from_min_jerk(&ts, &DVector::zeros(2), &DVector::from_element(2, 1.0))
        .expect("min-jerk");
    assert!(matches!(
        dmp.train(&demo_2d),
        Err(DmpBboError::DimensionMismatch { expected: 1, actual: 2, .. })
    ));
}
