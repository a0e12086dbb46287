use nom::{
    branch::alt,
    bytes::complete::{escaped_transform, is_not, tag},
    character::complete::{alpha1, alphanumeric1, char, multispace0, one_of, space0},
    combinator::{map, opt, recognize, value},
    multi::{many0, many1},
    sequence::{delimited, pair, tuple},
    IResult,
};

use crate::PortType;

/// One node in a parsed tree, with its port bindings and children.
#[derive(Debug, PartialEq, Eq)]
pub struct TreeDef<'src> {
    pub(crate) ty: &'src str,
    pub(crate) port_maps: Vec<PortMap<'src>>,
    pub(crate) children: Vec<TreeDef<'src>>,
}

impl<'src> TreeDef<'src> {
    #[allow(dead_code)]
    fn new(ty: &'src str) -> Self {
        Self::new_with_ports_and_children(ty, vec![], vec![])
    }

    #[allow(dead_code)]
    fn new_with_children(ty: &'src str, children: Vec<TreeDef<'src>>) -> Self {
        Self::new_with_ports_and_children(ty, vec![], children)
    }

    #[allow(dead_code)]
    fn new_with_ports(ty: &'src str, port_maps: Vec<PortMap<'src>>) -> Self {
        Self::new_with_ports_and_children(ty, port_maps, vec![])
    }

    fn new_with_ports_and_children(
        ty: &'src str,
        port_maps: Vec<PortMap<'src>>,
        children: Vec<TreeDef<'src>>,
    ) -> Self {
        Self {
            ty,
            port_maps,
            children,
        }
    }

    pub fn ty(&self) -> &'src str {
        self.ty
    }

    pub fn children(&self) -> &[TreeDef<'src>] {
        &self.children
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum BlackboardValue<'src> {
    /// Literal value could have decoded, so it is an owned string.
    Literal(String),
    Ref(&'src str),
}

#[derive(Debug, PartialEq, Eq)]
pub struct PortMap<'src> {
    pub(crate) ty: PortType,
    pub(crate) node_port: &'src str,
    pub(crate) blackboard_value: BlackboardValue<'src>,
}

#[derive(Debug, PartialEq)]
pub struct TreeRootDef<'src> {
    pub(crate) name: &'src str,
    pub(crate) root: TreeDef<'src>,
}

impl<'src> TreeRootDef<'src> {
    pub fn name(&self) -> &'src str {
        self.name
    }

    pub fn root(&self) -> &TreeDef<'src> {
        &self.root
    }
}

/// Every tree defined in one source text.
#[derive(Debug, PartialEq)]
pub struct TreeSource<'src> {
    pub tree_defs: Vec<TreeRootDef<'src>>,
}

impl<'src> TreeSource<'src> {
    pub fn tree(&self, name: &str) -> Option<&TreeRootDef<'src>> {
        self.tree_defs.iter().find(|tree| tree.name == name)
    }
}

fn identifier(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        alt((alpha1, tag("_"))),
        many0(alt((alphanumeric1, tag("_")))),
    ))(input)
}

fn newlines(i: &str) -> IResult<&str, ()> {
    delimited(space0, many1(one_of("\r\n")), space0)(i).map(|(rest, _)| (rest, ()))
}

fn open_paren(i: &str) -> IResult<&str, ()> {
    value((), delimited(space0, char('('), multispace0))(i)
}

fn close_paren(i: &str) -> IResult<&str, ()> {
    value((), delimited(multispace0, char(')'), space0))(i)
}

fn open_brace(i: &str) -> IResult<&str, ()> {
    value((), delimited(space0, char('{'), space0))(i)
}

fn close_brace(i: &str) -> IResult<&str, ()> {
    value((), delimited(space0, char('}'), space0))(i)
}

fn line_comment<T>(i: &str) -> IResult<&str, Option<T>> {
    let (i, _) = tuple((space0, char('#'), opt(is_not("\n\r"))))(i)?;

    Ok((i, None))
}

fn some<I, R>(f: impl Fn(I) -> IResult<I, R>) -> impl Fn(I) -> IResult<I, Option<R>> {
    move |i| {
        let (i, res) = f(i)?;
        Ok((i, Some(res)))
    }
}

fn parse_tree(i: &str) -> IResult<&str, TreeRootDef> {
    let (i, _) = delimited(multispace0, tag("tree"), space0)(i)?;

    let (i, name) = delimited(space0, identifier, space0)(i)?;

    let (i, _) = delimited(space0, tag("="), space0)(i)?;

    let (i, root) = parse_tree_node(i)?;

    Ok((i, TreeRootDef { name, root }))
}

fn tree_children(i: &str) -> IResult<&str, Vec<TreeDef>> {
    let (i, _) = many0(newlines)(i)?;

    let (i, v) = many0(delimited(
        space0,
        alt((line_comment, some(parse_tree_node))),
        many0(newlines),
    ))(i)?;

    let (i, _) = many0(newlines)(i)?;

    Ok((i, v.into_iter().flatten().collect()))
}

fn parse_tree_node(i: &str) -> IResult<&str, TreeDef> {
    let (i, ty) = delimited(space0, identifier, space0)(i)?;

    let (i, port_maps) = opt(delimited(open_paren, port_maps, close_paren))(i)?;

    let (i, children) = opt(delimited(open_brace, tree_children, close_brace))(i)?;

    let (i, _) = opt(line_comment::<()>)(i)?;

    Ok((
        i,
        TreeDef::new_with_ports_and_children(
            ty,
            port_maps.unwrap_or_default(),
            children.unwrap_or_default(),
        ),
    ))
}

fn port_maps(i: &str) -> IResult<&str, Vec<PortMap>> {
    many0(delimited(
        multispace0,
        port_map,
        many0(pair(multispace0, char(','))),
    ))(i)
}

fn port_direction(i: &str) -> IResult<&str, PortType> {
    delimited(
        space0,
        alt((
            value(PortType::InOut, tag("<->")),
            value(PortType::Input, tag("<-")),
            value(PortType::Output, tag("->")),
        )),
        space0,
    )(i)
}

fn port_map(i: &str) -> IResult<&str, PortMap> {
    let (i, node_port) = delimited(space0, identifier, space0)(i)?;

    let (i, ty) = port_direction(i)?;

    let (rest, blackboard_value) = delimited(space0, alt((bb_ref, str_literal)), space0)(i)?;

    // Nothing can be written into a literal, so refuse it while parsing.
    if matches!(blackboard_value, BlackboardValue::Literal(_)) && ty.writable() {
        return Err(nom::Err::Failure(nom::error::Error::new(
            i,
            nom::error::ErrorKind::Verify,
        )));
    }

    Ok((
        rest,
        PortMap {
            ty,
            node_port,
            blackboard_value,
        },
    ))
}

fn bb_ref(i: &str) -> IResult<&str, BlackboardValue> {
    map(identifier, BlackboardValue::Ref)(i)
}

/// A double quoted string with `\\`, `\"` and `\n` escapes.
fn str_literal(i: &str) -> IResult<&str, BlackboardValue> {
    let (i, val) = delimited(
        char('"'),
        opt(escaped_transform(
            is_not("\\\""),
            '\\',
            alt((
                value("\\", char('\\')),
                value("\"", char('"')),
                value("\n", char('n')),
            )),
        )),
        char('"'),
    )(i)?;
    Ok((i, BlackboardValue::Literal(val.unwrap_or_default())))
}

/// Parse a whole tree source file.
///
/// The returned remainder is empty when the input was consumed completely;
/// anything left over is text the grammar did not recognize.
pub fn parse_file(i: &str) -> IResult<&str, TreeSource> {
    let (i, stmts) = many0(alt((
        delimited(multispace0, line_comment, multispace0),
        some(parse_tree),
    )))(i)?;

    // Eat up trailing newlines to indicate that the input was thoroughly consumed
    let (i, _) = multispace0(i)?;

    Ok((
        i,
        TreeSource {
            tree_defs: stmts.into_iter().flatten().collect(),
        },
    ))
}
